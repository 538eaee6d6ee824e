//! The stateful room handle.
//!
//! `RoomClient` owns the single active channel subscription, performs
//! optimistic local mutations, and republishes this peer's presence
//! record on every change. A background translator task folds relay
//! events through the reducer and surfaces `RoomUpdate`s for the UI.

mod client;
mod translator;
mod types;

pub use client::RoomClient;
pub use types::{RoomTuning, RoomUpdate};
