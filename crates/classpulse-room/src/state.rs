//! Client-local room state.
//!
//! One mutable snapshot per peer, reconstructed independently from the
//! shared event stream. Presence-derived fields (`students`,
//! `teacher_present`) are relay-verified; everything else is
//! trust-on-receipt.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::protocol::ChatMessage;

/// Epoch milliseconds. The relay protocol carries no clock; timestamps are
/// stamped by whichever peer performs the mutation.
pub(crate) fn now_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

// ---------------------------------------------------------------------------
// Student status
// ---------------------------------------------------------------------------

/// The full status record for one student. This is the single source of
/// truth for that student and is republished whole on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StudentStatus {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub avatar_seed: String,
    pub needs_help: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub needs_help_at: Option<u64>,
    pub is_finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_finished_at: Option<u64>,
    pub hand_raised: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hand_raised_at: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buzzer_pressed_at: Option<u64>,
}

impl StudentStatus {
    /// Fresh record for a student joining a room. The session id doubles
    /// as the avatar seed.
    pub fn new(id: impl Into<String>, name: impl Into<String>, group: Option<String>) -> Self {
        let id = id.into();
        Self {
            avatar_seed: id.clone(),
            id,
            name: name.into(),
            group,
            ..Self::default()
        }
    }

    pub fn set_needs_help(&mut self, on: bool, now_ms: u64) {
        Self::transition(&mut self.needs_help, &mut self.needs_help_at, on, now_ms);
    }

    pub fn set_finished(&mut self, on: bool, now_ms: u64) {
        Self::transition(&mut self.is_finished, &mut self.is_finished_at, on, now_ms);
    }

    pub fn set_hand_raised(&mut self, on: bool, now_ms: u64) {
        Self::transition(&mut self.hand_raised, &mut self.hand_raised_at, on, now_ms);
    }

    pub fn record_buzzer_press(&mut self, now_ms: u64) {
        self.buzzer_pressed_at = Some(now_ms);
    }

    /// Clear the three status flags and their timestamps.
    pub fn reset(&mut self) {
        self.needs_help = false;
        self.needs_help_at = None;
        self.is_finished = false;
        self.is_finished_at = None;
        self.hand_raised = false;
        self.hand_raised_at = None;
    }

    /// Timestamp invariant: stamped exactly on the false-to-true
    /// transition, cleared on true-to-false, untouched when the flag does
    /// not change.
    fn transition(flag: &mut bool, at: &mut Option<u64>, on: bool, now_ms: u64) {
        if on && !*flag {
            *at = Some(now_ms);
        } else if !on {
            *at = None;
        }
        *flag = on;
    }
}

// ---------------------------------------------------------------------------
// Buzzer
// ---------------------------------------------------------------------------

/// First-come-wins buzzer. `winner_id` is set only while the buzzer is
/// locked; at most one winner per open period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuzzerState {
    pub active: bool,
    pub winner_id: Option<String>,
}

impl Default for BuzzerState {
    fn default() -> Self {
        Self {
            active: true,
            winner_id: None,
        }
    }
}

impl BuzzerState {
    /// Whether a press broadcast from `id` wins on this peer, evaluated
    /// against this peer's (possibly slightly stale) copy.
    pub fn accepts_press(&self) -> bool {
        self.active && self.winner_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Wall config
// ---------------------------------------------------------------------------

/// Wall moderation settings, replicated verbatim to every peer on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WallConfig {
    pub is_public: bool,
    pub show_names: bool,
    pub is_locked: bool,
    pub allowed_student_ids: Vec<String>,
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            is_public: true,
            show_names: true,
            is_locked: false,
            allowed_student_ids: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Room state
// ---------------------------------------------------------------------------

/// The aggregate room snapshot held by each peer.
#[derive(Debug, Clone, Default)]
pub struct RoomState {
    pub students: HashMap<String, StudentStatus>,
    pub messages: Vec<ChatMessage>,
    pub buzzer: BuzzerState,
    pub wall_config: WallConfig,
    pub teacher_present: bool,
    /// Recently applied message ids, for at-least-once redelivery de-dup.
    seen_message_ids: VecDeque<String>,
    dedup_window: usize,
}

impl RoomState {
    /// Fresh, empty state for a newly subscribed room.
    pub fn new(dedup_window: usize) -> Self {
        Self {
            dedup_window: dedup_window.max(1),
            ..Self::default()
        }
    }

    /// Append a message unless its id was seen recently. Returns whether
    /// the message was actually appended.
    pub(crate) fn append_message(&mut self, message: ChatMessage) -> bool {
        if self.seen_message_ids.contains(&message.id) {
            return false;
        }
        if self.dedup_window == 0 {
            // Default-constructed state keeps a sane window.
            self.dedup_window = 256;
        }
        if self.seen_message_ids.len() >= self.dedup_window {
            self.seen_message_ids.pop_front();
        }
        self.seen_message_ids.push_back(message.id.clone());
        self.messages.push(message);
        true
    }

    /// Students ordered by name, for stable roster rendering.
    pub fn roster(&self) -> Vec<&StudentStatus> {
        let mut students: Vec<&StudentStatus> = self.students.values().collect();
        students.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        students
    }

    pub fn count_finished(&self) -> usize {
        self.students.values().filter(|s| s.is_finished).count()
    }

    pub fn count_needing_help(&self) -> usize {
        self.students.values().filter(|s| s.needs_help).count()
    }

    pub fn count_hands_raised(&self) -> usize {
        self.students.values().filter(|s| s.hand_raised).count()
    }
}
