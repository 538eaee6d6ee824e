//! Tuning knobs and UI-facing update events for the room client.

use crate::protocol::ChatMessage;
use crate::state::{BuzzerState, WallConfig};

/// Client-local behavior knobs.
#[derive(Debug, Clone)]
pub struct RoomTuning {
    /// Recent message ids remembered for redelivery de-dup.
    pub dedup_window: usize,
    /// Upper bound on an embedded image data URI, in bytes.
    pub max_image_bytes: usize,
}

impl Default for RoomTuning {
    fn default() -> Self {
        Self {
            dedup_window: 256,
            max_image_bytes: 512 * 1024,
        }
    }
}

/// Events surfaced to the UI layer.
///
/// Each update is a cue to re-read the parts of the state it names; the
/// full snapshot is always available from `RoomClient::state`.
#[derive(Debug, Clone)]
pub enum RoomUpdate {
    /// The relay websocket is up.
    RelayConnected,
    /// The relay websocket is down or still connecting. Not an error:
    /// the room stays in this state indefinitely if the relay is
    /// unreachable.
    RelayWaiting,
    /// Our channel subscription was acknowledged.
    RoomJoined { topic: String },
    /// The roster was rebuilt from a presence snapshot.
    RosterChanged {
        student_count: usize,
        teacher_present: bool,
    },
    /// The buzzer locked, unlocked, or found a winner.
    BuzzerChanged(BuzzerState),
    /// A wall post arrived and was appended.
    MessagePosted(ChatMessage),
    /// The wall moderation settings were replaced.
    WallChanged(WallConfig),
    /// The teacher removed *us* from the room.
    RemovedFromRoom,
    /// A non-fatal relay problem worth showing.
    RelayIssue(String),
}
