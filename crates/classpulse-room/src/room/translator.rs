//! Background task that folds relay events into the room state.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use classpulse_relay::{PresenceMap, RelayClient, RelayEvent};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::protocol::{
    events, student_presence_payload, teacher_presence_payload, BuzzerPayload, ChatMessage,
    ControlCommand,
};
use crate::reducer::{snapshot_from_presence_map, RoomEvent};

use super::client::Shared;
use super::types::RoomUpdate;

/// Drain relay events for the lifetime of the connection, applying each
/// to the shared state through the reducer and emitting UI updates.
///
/// All state mutation for inbound traffic happens on this single task;
/// there is no cross-task write contention to reason about.
pub(crate) async fn run_translator(
    mut relay_rx: mpsc::Receiver<RelayEvent>,
    update_tx: mpsc::Sender<RoomUpdate>,
    shared: Arc<Shared>,
    relay: RelayClient,
) {
    // Raw presence for the current room, kept so diffs can be folded into
    // the next full snapshot; the reducer only ever sees full snapshots.
    let mut presence = PresenceMap::new();

    while let Some(event) = relay_rx.recv().await {
        match event {
            RelayEvent::Connected => {
                let _ = update_tx.send(RoomUpdate::RelayConnected).await;
            }
            RelayEvent::Disconnected => {
                presence.clear();
                let _ = update_tx.send(RoomUpdate::RelayWaiting).await;
            }
            RelayEvent::ChannelJoined { topic } => {
                if !is_current_topic(&shared, &topic).await {
                    continue;
                }
                announce_presence(&shared, &relay, &topic).await;
                let _ = update_tx.send(RoomUpdate::RoomJoined { topic }).await;
            }
            RelayEvent::Broadcast {
                topic,
                event,
                payload,
            } => {
                if !is_current_topic(&shared, &topic).await {
                    continue;
                }
                handle_broadcast(&shared, &update_tx, &event, payload).await;
            }
            RelayEvent::PresenceState { topic, state } => {
                if !is_current_topic(&shared, &topic).await {
                    continue;
                }
                presence = state;
                resync_roster(&shared, &update_tx, &presence).await;
            }
            RelayEvent::PresenceDiff {
                topic,
                joins,
                leaves,
            } => {
                if !is_current_topic(&shared, &topic).await {
                    continue;
                }
                for key in leaves.keys() {
                    presence.remove(key);
                }
                for (key, metas) in joins {
                    presence.insert(key, metas);
                }
                resync_roster(&shared, &update_tx, &presence).await;
            }
            RelayEvent::Error(error) => {
                warn!(error = %error, "relay reported a problem");
                let _ = update_tx
                    .send(RoomUpdate::RelayIssue(error.to_string()))
                    .await;
            }
        }
    }
}

async fn is_current_topic(shared: &Shared, topic: &str) -> bool {
    shared.topic.read().await.as_deref() == Some(topic)
}

/// Publish our presence payload right after the subscription is
/// acknowledged: the full status record for students, identification
/// only for teachers.
async fn announce_presence(shared: &Shared, relay: &RelayClient, topic: &str) {
    let identity = shared.identity.read().await.clone();
    let payload = if identity.is_teacher() {
        teacher_presence_payload(&identity.session_id, &identity.display_name)
    } else {
        let status = shared.my_status.read().await.clone();
        student_presence_payload(&status)
    };
    relay.track(topic, payload).await;
}

/// Rebuild the roster from scratch out of the latest raw presence map.
async fn resync_roster(
    shared: &Shared,
    update_tx: &mpsc::Sender<RoomUpdate>,
    presence: &PresenceMap,
) {
    let participants = snapshot_from_presence_map(presence);
    let next = shared.apply(RoomEvent::PresenceSnapshot(participants)).await;
    let _ = update_tx
        .send(RoomUpdate::RosterChanged {
            student_count: next.students.len(),
            teacher_present: next.teacher_present,
        })
        .await;
}

async fn handle_broadcast(
    shared: &Shared,
    update_tx: &mpsc::Sender<RoomUpdate>,
    event: &str,
    payload: serde_json::Value,
) {
    match event {
        events::BUZZER => {
            let Ok(press) = serde_json::from_value::<BuzzerPayload>(payload) else {
                debug!("malformed buzzer payload");
                return;
            };
            let before = shared.state.read().await.buzzer.clone();
            let next = shared.apply(RoomEvent::BuzzerPress { id: press.id }).await;
            if next.buzzer != before {
                let _ = update_tx
                    .send(RoomUpdate::BuzzerChanged(next.buzzer.clone()))
                    .await;
            }
        }
        events::MESSAGE => {
            let Ok(message) = serde_json::from_value::<ChatMessage>(payload) else {
                debug!("malformed message payload");
                return;
            };
            let count_before = shared.state.read().await.messages.len();
            let next = shared.apply(RoomEvent::Message(message.clone())).await;
            // redeliveries (and our own echoed posts) are de-duped; only
            // genuinely new messages reach the UI
            if next.messages.len() > count_before {
                let _ = update_tx.send(RoomUpdate::MessagePosted(message)).await;
            }
        }
        events::CONTROL => {
            let Ok(command) = serde_json::from_value::<ControlCommand>(payload) else {
                debug!("malformed control payload");
                return;
            };
            apply_control(shared, update_tx, command).await;
        }
        other => {
            debug!(event = %other, "unhandled broadcast event");
        }
    }
}

async fn apply_control(
    shared: &Shared,
    update_tx: &mpsc::Sender<RoomUpdate>,
    command: ControlCommand,
) {
    let command_kind = command.clone();
    let next = shared.apply(RoomEvent::Control(command)).await;

    // the per-round press latch opens whenever the winner is cleared
    if next.buzzer.winner_id.is_none() {
        shared.buzzer_pressed.store(false, Ordering::Relaxed);
    }

    match command_kind {
        ControlCommand::ResetBuzzer | ControlCommand::LockBuzzer => {
            let _ = update_tx
                .send(RoomUpdate::BuzzerChanged(next.buzzer.clone()))
                .await;
        }
        ControlCommand::ResetAll => {
            let _ = update_tx
                .send(RoomUpdate::BuzzerChanged(next.buzzer.clone()))
                .await;
            let _ = update_tx
                .send(RoomUpdate::RosterChanged {
                    student_count: next.students.len(),
                    teacher_present: next.teacher_present,
                })
                .await;
        }
        ControlCommand::UpdateWall { .. } => {
            let _ = update_tx
                .send(RoomUpdate::WallChanged(next.wall_config.clone()))
                .await;
        }
        ControlCommand::RemoveStudent { id } => {
            let our_id = shared.identity.read().await.session_id.clone();
            if id == our_id {
                let _ = update_tx.send(RoomUpdate::RemovedFromRoom).await;
            }
            let _ = update_tx
                .send(RoomUpdate::RosterChanged {
                    student_count: next.students.len(),
                    teacher_present: next.teacher_present,
                })
                .await;
        }
    }
}
