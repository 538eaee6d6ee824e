//! The state-transition function.
//!
//! Every peer runs the exact same reducer over the events its relay
//! connection delivers, in arrival order. No merging: presence snapshots
//! replace the roster wholesale, controls overwrite their named fields,
//! and the last write wins.

use std::collections::HashMap;

use tracing::debug;

use crate::protocol::{ChatMessage, ControlCommand, Participant};
use crate::state::{BuzzerState, RoomState};

/// One inbound event, already decoded from the wire.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// Full presence snapshot: every currently-tracked payload, decoded.
    PresenceSnapshot(Vec<Participant>),
    /// A `buzzer` broadcast from the given student.
    BuzzerPress { id: String },
    /// A `message` broadcast.
    Message(ChatMessage),
    /// A `control` broadcast.
    Control(ControlCommand),
}

/// Apply one event to a snapshot, producing the next snapshot.
///
/// Pure: no I/O, no clock. Repeated delivery of the same event is safe --
/// a duplicate buzzer press finds the buzzer already locked, a duplicate
/// message id is dropped by the de-dup window, and control overwrites are
/// naturally idempotent.
pub fn apply(state: &RoomState, event: RoomEvent) -> RoomState {
    let mut next = state.clone();
    match event {
        RoomEvent::PresenceSnapshot(participants) => {
            let mut students = HashMap::new();
            let mut teacher_present = false;
            for participant in participants {
                match participant {
                    Participant::Teacher { .. } => teacher_present = true,
                    Participant::Student(status) => {
                        students.insert(status.id.clone(), status);
                    }
                }
            }
            // full replace: whoever dropped out of the snapshot is gone
            next.students = students;
            next.teacher_present = teacher_present;
        }
        RoomEvent::BuzzerPress { id } => {
            if next.buzzer.accepts_press() {
                next.buzzer = BuzzerState {
                    active: false,
                    winner_id: Some(id),
                };
            } else {
                debug!(id = %id, "buzzer press ignored, round already decided");
            }
        }
        RoomEvent::Message(message) => {
            next.append_message(message);
        }
        RoomEvent::Control(command) => apply_control(&mut next, command),
    }
    next
}

fn apply_control(state: &mut RoomState, command: ControlCommand) {
    match command {
        ControlCommand::ResetBuzzer => {
            state.buzzer = BuzzerState {
                active: true,
                winner_id: None,
            };
        }
        ControlCommand::LockBuzzer => {
            state.buzzer = BuzzerState {
                active: false,
                winner_id: None,
            };
        }
        ControlCommand::ResetAll => {
            for student in state.students.values_mut() {
                student.reset();
            }
            state.buzzer.winner_id = None;
        }
        ControlCommand::UpdateWall { config } => {
            // whole-object replace, never a partial merge on receipt
            state.wall_config = config;
        }
        ControlCommand::RemoveStudent { id } => {
            state.students.remove(&id);
        }
    }
}

/// Convenience for the roster rebuild: decode every tracked meta in a raw
/// presence map, taking the first meta per peer key.
pub fn snapshot_from_presence_map(
    map: &std::collections::HashMap<String, Vec<serde_json::Value>>,
) -> Vec<Participant> {
    map.values()
        .filter_map(|metas| metas.first())
        .filter_map(crate::protocol::decode_presence_meta)
        .collect()
}
