use classpulse_common::new_id;
use serde::{Deserialize, Serialize};

use crate::protocol::Role;

/// Per-join identity of this client.
///
/// The session id is generated fresh on every (re)join; the room has no
/// durable participant registry beyond current presence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub session_id: String,
    pub display_name: String,
    pub role: Role,
    /// Group label, students only.
    pub group: Option<String>,
}

impl Identity {
    pub fn student(display_name: impl Into<String>, group: Option<String>) -> Self {
        Self {
            session_id: new_id(),
            display_name: display_name.into(),
            role: Role::Student,
            group,
        }
    }

    pub fn teacher(display_name: impl Into<String>) -> Self {
        Self {
            session_id: new_id(),
            display_name: display_name.into(),
            role: Role::Teacher,
            group: None,
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }
}

/// Normalize a user-entered room key: trim and ASCII-lowercase.
pub fn normalize_room_key(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// Relay topic for a room key: one global topic per normalized key.
pub fn room_topic(raw_key: &str) -> String {
    format!("classroom-room-{}", normalize_room_key(raw_key))
}

/// Teacher join gate: a single shared passphrase compared client-side.
/// There is no server verification behind this.
pub fn verify_teacher_passphrase(input: &str, expected: &str) -> bool {
    !expected.is_empty() && input == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn student_identity_carries_group() {
        let identity = Identity::student("An", Some("A".into()));
        assert_eq!(identity.role, Role::Student);
        assert_eq!(identity.group.as_deref(), Some("A"));
        assert!(!identity.is_teacher());
    }

    #[test]
    fn teacher_identity_has_no_group() {
        let identity = Identity::teacher("Ms. Lan");
        assert!(identity.is_teacher());
        assert!(identity.group.is_none());
    }

    #[test]
    fn session_ids_are_fresh_per_join() {
        let first = Identity::student("An", None);
        let rejoin = Identity::student("An", None);
        assert_ne!(first.session_id, rejoin.session_id);
    }

    #[test]
    fn room_key_normalization() {
        assert_eq!(normalize_room_key("  5A2  "), "5a2");
        assert_eq!(normalize_room_key("Math-101"), "math-101");
    }

    #[test]
    fn room_topic_uses_normalized_key() {
        assert_eq!(room_topic(" 5A2 "), "classroom-room-5a2");
        // same topic for every spelling of the key
        assert_eq!(room_topic("5a2"), room_topic("  5A2"));
    }

    #[test]
    fn passphrase_gate() {
        assert!(verify_teacher_passphrase("chalk", "chalk"));
        assert!(!verify_teacher_passphrase("guess", "chalk"));
        // an empty configured passphrase never admits anyone
        assert!(!verify_teacher_passphrase("", ""));
    }
}
