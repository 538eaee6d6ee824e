//! Public handle for participating in a room.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use classpulse_common::{new_id, new_short_id, ClasspulseError};
use classpulse_relay::{ChannelOptions, RelayClient, RelayConfig};
use tokio::sync::{mpsc, RwLock};
use tracing::debug;

use crate::identity::{room_topic, Identity};
use crate::protocol::{
    events, student_presence_payload, BuzzerPayload, ChatMessage, ControlCommand, Role,
};
use crate::reducer::{apply, RoomEvent};
use crate::state::{now_millis, RoomState, StudentStatus, WallConfig};
use crate::wall;

use super::translator::run_translator;
use super::types::{RoomTuning, RoomUpdate};

/// State shared between the client handle and its translator task.
pub(crate) struct Shared {
    pub(crate) state: RwLock<RoomState>,
    pub(crate) identity: RwLock<Identity>,
    pub(crate) my_status: RwLock<StudentStatus>,
    pub(crate) topic: RwLock<Option<String>>,
    /// Local one-press-per-round latch for the buzzer button.
    pub(crate) buzzer_pressed: AtomicBool,
    pub(crate) dedup_window: usize,
}

impl Shared {
    /// Run one event through the reducer under the state lock and return
    /// the new snapshot. All mutation funnels through here, so each peer
    /// is effectively single-writer.
    pub(crate) async fn apply(&self, event: RoomEvent) -> RoomState {
        let mut guard = self.state.write().await;
        let next = apply(&guard, event);
        *guard = next.clone();
        next
    }

    /// Optimistically place our own record in the roster; the relay's
    /// presence echo will confirm it on the next snapshot.
    pub(crate) async fn upsert_self(&self, status: StudentStatus) {
        let mut guard = self.state.write().await;
        guard.students.insert(status.id.clone(), status);
    }
}

/// Handle for one peer's participation in a classroom room.
pub struct RoomClient {
    shared: Arc<Shared>,
    relay: RelayClient,
    max_image_bytes: usize,
}

impl RoomClient {
    /// Start the relay connection and the translator task. Returns the
    /// client and the stream of UI updates.
    ///
    /// Nothing here fails: with bad or missing relay credentials the
    /// connection simply never comes up and the room stays in
    /// `RelayWaiting`.
    pub fn connect(
        identity: Identity,
        relay_config: RelayConfig,
        tuning: RoomTuning,
    ) -> (Self, mpsc::Receiver<RoomUpdate>) {
        let (relay, relay_rx) = RelayClient::connect(relay_config);
        let (update_tx, update_rx) = mpsc::channel(256);

        let my_status = StudentStatus::new(
            identity.session_id.clone(),
            identity.display_name.clone(),
            identity.group.clone(),
        );
        let shared = Arc::new(Shared {
            state: RwLock::new(RoomState::new(tuning.dedup_window)),
            identity: RwLock::new(identity),
            my_status: RwLock::new(my_status),
            topic: RwLock::new(None),
            buzzer_pressed: AtomicBool::new(false),
            dedup_window: tuning.dedup_window,
        });

        tokio::spawn(run_translator(
            relay_rx,
            update_tx,
            Arc::clone(&shared),
            relay.clone(),
        ));

        (
            Self {
                shared,
                relay,
                max_image_bytes: tuning.max_image_bytes,
            },
            update_rx,
        )
    }

    // -- room lifecycle ----------------------------------------------------

    /// Join a room, tearing down the previous subscription if one is
    /// open. A fresh session id is generated for this join and the local
    /// state starts empty; nothing survives from the previous room.
    pub async fn join_room(&self, room_key: &str) {
        let topic = room_topic(room_key);

        let session_id = new_id();
        let presence_key = session_id.clone();
        {
            let mut identity = self.shared.identity.write().await;
            identity.session_id = session_id.clone();
            let mut status = self.shared.my_status.write().await;
            *status = StudentStatus::new(
                session_id,
                identity.display_name.clone(),
                identity.group.clone(),
            );
        }

        let previous = self.shared.topic.write().await.replace(topic.clone());
        if let Some(old) = previous {
            debug!(topic = %old, "leaving previous room channel");
            self.relay.untrack(&old).await;
            self.relay.leave(&old).await;
        }

        *self.shared.state.write().await = RoomState::new(self.shared.dedup_window);
        self.shared.buzzer_pressed.store(false, Ordering::Relaxed);

        self.relay
            .join(&topic, ChannelOptions::keyed_by(presence_key))
            .await;
    }

    /// Leave the current room and discard its state.
    pub async fn leave_room(&self) {
        if let Some(topic) = self.shared.topic.write().await.take() {
            self.relay.untrack(&topic).await;
            self.relay.leave(&topic).await;
        }
        *self.shared.state.write().await = RoomState::new(self.shared.dedup_window);
        self.shared.buzzer_pressed.store(false, Ordering::Relaxed);
    }

    /// Leave the room and close the relay connection.
    pub async fn shutdown(&self) {
        self.leave_room().await;
        self.relay.shutdown().await;
    }

    // -- reads -------------------------------------------------------------

    /// A clone of the current room snapshot.
    pub async fn state(&self) -> RoomState {
        self.shared.state.read().await.clone()
    }

    pub async fn identity(&self) -> Identity {
        self.shared.identity.read().await.clone()
    }

    pub fn is_relay_connected(&self) -> bool {
        self.relay.is_connected()
    }

    // -- student status ----------------------------------------------------

    pub async fn set_needs_help(&self, on: bool) {
        self.mutate_status(|status, now| status.set_needs_help(on, now))
            .await;
    }

    pub async fn set_finished(&self, on: bool) {
        self.mutate_status(|status, now| status.set_finished(on, now))
            .await;
    }

    pub async fn set_hand_raised(&self, on: bool) {
        self.mutate_status(|status, now| status.set_hand_raised(on, now))
            .await;
    }

    /// Apply one mutation to our status record, mirror it into the local
    /// roster, and republish the full record so the next presence
    /// snapshot carries it.
    async fn mutate_status(&self, mutate: impl FnOnce(&mut StudentStatus, u64)) {
        if self.shared.identity.read().await.is_teacher() {
            debug!("ignoring status mutation for teacher");
            return;
        }
        let snapshot = {
            let mut status = self.shared.my_status.write().await;
            mutate(&mut status, now_millis());
            status.clone()
        };
        self.shared.upsert_self(snapshot).await;
        self.publish_status().await;
    }

    async fn publish_status(&self) {
        let Some(topic) = self.shared.topic.read().await.clone() else {
            return;
        };
        let status = self.shared.my_status.read().await.clone();
        self.relay
            .track(&topic, student_presence_payload(&status))
            .await;
    }

    // -- buzzer ------------------------------------------------------------

    /// Press the buzzer. Gated client-side: refused while the buzzer is
    /// locked, while another student holds the win, and after one local
    /// press until the winner is cleared.
    pub async fn press_buzzer(&self) -> Result<(), ClasspulseError> {
        let identity = self.shared.identity.read().await.clone();
        if identity.role != Role::Student {
            return Err(ClasspulseError::Room("only students race the buzzer".into()));
        }
        if self.shared.buzzer_pressed.load(Ordering::Relaxed) {
            return Err(ClasspulseError::Room(
                "already pressed this round".into(),
            ));
        }
        if !self.shared.state.read().await.buzzer.accepts_press() {
            return Err(ClasspulseError::Room("the buzzer is locked".into()));
        }

        self.shared.buzzer_pressed.store(true, Ordering::Relaxed);
        let snapshot = {
            let mut status = self.shared.my_status.write().await;
            status.record_buzzer_press(now_millis());
            status.clone()
        };
        self.shared.upsert_self(snapshot).await;

        // optimistic: we may already be the winner on our own screen;
        // peers adjudicate the same press against their own copies
        self.shared
            .apply(RoomEvent::BuzzerPress {
                id: identity.session_id.clone(),
            })
            .await;

        if let Some(topic) = self.shared.topic.read().await.clone() {
            let payload = serde_json::to_value(BuzzerPayload {
                id: identity.session_id,
            })
            .unwrap_or_default();
            self.relay.send(&topic, events::BUZZER, payload).await;
        }
        self.publish_status().await;
        Ok(())
    }

    // -- wall --------------------------------------------------------------

    /// Post to the wall. Text is trimmed; an image must already be
    /// resized JPEG bytes and is embedded as a data URI.
    pub async fn post_message(
        &self,
        text: Option<&str>,
        image_jpeg: Option<&[u8]>,
    ) -> Result<ChatMessage, ClasspulseError> {
        let identity = self.shared.identity.read().await.clone();
        let config = self.shared.state.read().await.wall_config.clone();
        if !wall::can_post(&identity.session_id, identity.role, &config) {
            return Err(ClasspulseError::Room("the wall is locked".into()));
        }

        let text = text
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(String::from);
        let image_url = match image_jpeg {
            Some(bytes) => Some(wall::image_data_uri(bytes, self.max_image_bytes)?),
            None => None,
        };
        if text.is_none() && image_url.is_none() {
            return Err(ClasspulseError::Room("nothing to post".into()));
        }

        let message = ChatMessage {
            id: new_short_id(),
            sender_id: identity.session_id.clone(),
            sender_name: identity.display_name.clone(),
            role: identity.role,
            text,
            image_url,
            timestamp: now_millis(),
        };

        self.shared
            .apply(RoomEvent::Message(message.clone()))
            .await;
        if let Some(topic) = self.shared.topic.read().await.clone() {
            let payload = serde_json::to_value(&message).unwrap_or_default();
            self.relay.send(&topic, events::MESSAGE, payload).await;
        }
        Ok(message)
    }

    // -- teacher controls --------------------------------------------------

    pub async fn reset_buzzer(&self) -> Result<(), ClasspulseError> {
        self.send_control(ControlCommand::ResetBuzzer).await
    }

    pub async fn lock_buzzer(&self) -> Result<(), ClasspulseError> {
        self.send_control(ControlCommand::LockBuzzer).await
    }

    pub async fn reset_all(&self) -> Result<(), ClasspulseError> {
        self.send_control(ControlCommand::ResetAll).await
    }

    pub async fn remove_student(&self, id: &str) -> Result<(), ClasspulseError> {
        self.send_control(ControlCommand::RemoveStudent { id: id.to_string() })
            .await
    }

    /// Edit the wall config. The merge happens locally; what goes out is
    /// the complete replacement object.
    pub async fn update_wall(
        &self,
        mutate: impl FnOnce(&mut WallConfig),
    ) -> Result<WallConfig, ClasspulseError> {
        let mut config = self.shared.state.read().await.wall_config.clone();
        mutate(&mut config);
        self.send_control(ControlCommand::UpdateWall {
            config: config.clone(),
        })
        .await?;
        Ok(config)
    }

    async fn send_control(&self, command: ControlCommand) -> Result<(), ClasspulseError> {
        if !self.shared.identity.read().await.is_teacher() {
            return Err(ClasspulseError::Room(
                "moderation commands are teacher-only".into(),
            ));
        }

        let next = self.shared.apply(RoomEvent::Control(command.clone())).await;
        if next.buzzer.winner_id.is_none() {
            self.shared.buzzer_pressed.store(false, Ordering::Relaxed);
        }

        if let Some(topic) = self.shared.topic.read().await.clone() {
            let payload = serde_json::to_value(&command).unwrap_or_default();
            self.relay.send(&topic, events::CONTROL, payload).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student_client() -> (RoomClient, mpsc::Receiver<RoomUpdate>) {
        // no relay credentials: the connection never comes up, commands
        // queue, and every local/optimistic path is still exercised
        RoomClient::connect(
            Identity::student("An", Some("A".into())),
            RelayConfig::default(),
            RoomTuning::default(),
        )
    }

    fn teacher_client() -> (RoomClient, mpsc::Receiver<RoomUpdate>) {
        RoomClient::connect(
            Identity::teacher("Ms. Lan"),
            RelayConfig::default(),
            RoomTuning::default(),
        )
    }

    #[tokio::test]
    async fn join_regenerates_session_id() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        let first = client.identity().await.session_id;
        client.join_room("5A2").await;
        let second = client.identity().await.session_id;
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn join_discards_previous_room_state() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        client.set_hand_raised(true).await;
        assert_eq!(client.state().await.students.len(), 1);

        client.join_room("math-101").await;
        let state = client.state().await;
        assert!(state.students.is_empty());
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn status_mutation_is_optimistic_and_stamped() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        client.set_needs_help(true).await;

        let state = client.state().await;
        let id = client.identity().await.session_id;
        let me = &state.students[&id];
        assert!(me.needs_help);
        assert!(me.needs_help_at.is_some());
    }

    #[tokio::test]
    async fn teacher_ignores_status_mutations() {
        let (client, _rx) = teacher_client();
        client.join_room("5A2").await;
        client.set_finished(true).await;
        assert!(client.state().await.students.is_empty());
    }

    #[tokio::test]
    async fn press_buzzer_wins_locally_once() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;

        client.press_buzzer().await.unwrap();
        let state = client.state().await;
        assert!(!state.buzzer.active);
        assert_eq!(
            state.buzzer.winner_id,
            Some(client.identity().await.session_id)
        );

        // the local latch refuses a second press
        let err = client.press_buzzer().await.unwrap_err();
        assert!(err.to_string().contains("already pressed"));
    }

    #[tokio::test]
    async fn press_buzzer_refused_when_locked() {
        let (teacher, _trx) = teacher_client();
        teacher.join_room("5A2").await;
        teacher.lock_buzzer().await.unwrap();
        assert!(!teacher.state().await.buzzer.active);

        let (student, _srx) = student_client();
        student.join_room("5A2").await;
        // simulate the lock arriving at the student's peer
        student
            .shared
            .apply(RoomEvent::Control(ControlCommand::LockBuzzer))
            .await;
        let err = student.press_buzzer().await.unwrap_err();
        assert!(err.to_string().contains("locked"));
    }

    #[tokio::test]
    async fn teacher_cannot_press_buzzer() {
        let (client, _rx) = teacher_client();
        client.join_room("5A2").await;
        assert!(client.press_buzzer().await.is_err());
    }

    #[tokio::test]
    async fn post_message_appends_locally() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;

        let message = client.post_message(Some("  hello  "), None).await.unwrap();
        assert_eq!(message.text.as_deref(), Some("hello"));

        let state = client.state().await;
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].id, message.id);
    }

    #[tokio::test]
    async fn post_message_rejects_empty_and_locked() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;

        assert!(client.post_message(Some("   "), None).await.is_err());

        client
            .shared
            .apply(RoomEvent::Control(ControlCommand::UpdateWall {
                config: WallConfig {
                    is_locked: true,
                    ..WallConfig::default()
                },
            }))
            .await;
        let err = client.post_message(Some("hi"), None).await.unwrap_err();
        assert!(err.to_string().contains("locked"));
    }

    #[tokio::test]
    async fn allowed_student_can_post_on_locked_wall() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        let id = client.identity().await.session_id;

        client
            .shared
            .apply(RoomEvent::Control(ControlCommand::UpdateWall {
                config: WallConfig {
                    is_locked: true,
                    allowed_student_ids: vec![id],
                    ..WallConfig::default()
                },
            }))
            .await;
        assert!(client.post_message(Some("hi"), None).await.is_ok());
    }

    #[tokio::test]
    async fn controls_are_teacher_only() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        assert!(client.reset_buzzer().await.is_err());
        assert!(client.remove_student("s9").await.is_err());
        assert!(client.update_wall(|c| c.is_public = false).await.is_err());
    }

    #[tokio::test]
    async fn update_wall_merges_locally_sends_full_config() {
        let (client, _rx) = teacher_client();
        client.join_room("5A2").await;

        client.update_wall(|c| c.is_locked = true).await.unwrap();
        let config = client
            .update_wall(|c| c.allowed_student_ids.push("s1".into()))
            .await
            .unwrap();

        // the second edit preserved the first: merge happened locally
        assert!(config.is_locked);
        assert_eq!(config.allowed_student_ids, vec!["s1".to_string()]);
        assert_eq!(client.state().await.wall_config, config);
    }

    #[tokio::test]
    async fn reset_buzzer_reopens_round_and_clears_latch() {
        let (teacher, _trx) = teacher_client();
        teacher.join_room("5A2").await;
        teacher.lock_buzzer().await.unwrap();
        teacher.reset_buzzer().await.unwrap();

        let state = teacher.state().await;
        assert!(state.buzzer.active);
        assert_eq!(state.buzzer.winner_id, None);
    }

    #[tokio::test]
    async fn leave_room_discards_state() {
        let (client, _rx) = student_client();
        client.join_room("5A2").await;
        client.post_message(Some("hello"), None).await.unwrap();

        client.leave_room().await;
        let state = client.state().await;
        assert!(state.messages.is_empty());
        assert!(state.students.is_empty());
    }
}
