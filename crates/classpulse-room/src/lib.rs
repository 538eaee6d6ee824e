//! Room synchronization core.
//!
//! Every peer reconstructs the same `RoomState` from an identical event
//! stream: relay-verified presence snapshots for the roster, and
//! trust-on-receipt broadcasts for the buzzer, the wall, and moderation
//! commands. State transitions go through one pure reducer so the
//! "no merge, last-write-wins" semantics stay testable without networking.

pub mod identity;
pub mod protocol;
pub mod reducer;
pub mod room;
pub mod state;
pub mod wall;

pub use identity::{normalize_room_key, room_topic, verify_teacher_passphrase, Identity};
pub use protocol::{
    decode_presence_meta, events, BuzzerPayload, ChatMessage, ControlCommand, Participant, Role,
};
pub use reducer::{apply, RoomEvent};
pub use room::{RoomClient, RoomTuning, RoomUpdate};
pub use state::{BuzzerState, RoomState, StudentStatus, WallConfig};
