//! Application-level payloads that ride inside relay broadcasts and
//! presence tracks. The transport envelope is handled by
//! `classpulse-relay`; everything here is the classroom wire format,
//! camelCase on the wire so every client speaks the same dialect.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::StudentStatus;

/// Event names used in relay broadcasts.
pub mod events {
    pub const BUZZER: &str = "buzzer";
    pub const MESSAGE: &str = "message";
    pub const CONTROL: &str = "control";
}

// ---------------------------------------------------------------------------
// Roles & participants
// ---------------------------------------------------------------------------

/// Participant role. The wire discriminant for presence payloads and
/// message authorship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Teacher,
    Student,
}

/// A decoded presence payload.
///
/// Teachers track just enough to be identified; students track their full
/// status record.
#[derive(Debug, Clone, PartialEq)]
pub enum Participant {
    Teacher { id: String, name: String },
    Student(StudentStatus),
}

/// Decode one tracked presence meta into a participant.
///
/// Acceptance is deliberately permissive: any payload that does not
/// declare itself a teacher is treated as a student, provided it carries a
/// non-empty id and name. Anything less is dropped.
pub fn decode_presence_meta(meta: &serde_json::Value) -> Option<Participant> {
    let role = meta.get("role").and_then(|r| r.as_str());

    if role == Some("teacher") {
        return Some(Participant::Teacher {
            id: meta
                .get("id")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            name: meta
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown")
                .to_string(),
        });
    }

    match serde_json::from_value::<StudentStatus>(meta.clone()) {
        Ok(status) if !status.id.is_empty() && !status.name.is_empty() => {
            Some(Participant::Student(status))
        }
        _ => {
            debug!(meta = %meta, "dropping malformed presence payload");
            None
        }
    }
}

/// Presence payload tracked by a student: the full status record plus the
/// role discriminant.
pub fn student_presence_payload(status: &StudentStatus) -> serde_json::Value {
    let mut payload = serde_json::to_value(status).unwrap_or_default();
    if let Some(obj) = payload.as_object_mut() {
        obj.insert("role".into(), serde_json::json!("student"));
    }
    payload
}

/// Presence payload tracked by a teacher: identification only, no status
/// record.
pub fn teacher_presence_payload(id: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": name,
        "role": "teacher",
    })
}

// ---------------------------------------------------------------------------
// Broadcast payloads
// ---------------------------------------------------------------------------

/// Payload of a `buzzer` broadcast: the pressing student's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuzzerPayload {
    pub id: String,
}

/// One wall post. Append-only and ephemeral; a rejoining peer starts with
/// an empty wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub sender_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Client-resized JPEG as a data URI, embedded directly in the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub timestamp: u64,
}

/// Moderation commands. Each is a total overwrite of the named fields on
/// receipt; `UpdateWall` replaces the whole config even when the sender
/// computed it as a local partial merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ControlCommand {
    #[serde(rename = "RESET_BUZZER")]
    ResetBuzzer,
    #[serde(rename = "LOCK_BUZZER")]
    LockBuzzer,
    #[serde(rename = "RESET_ALL")]
    ResetAll,
    #[serde(rename = "UPDATE_WALL")]
    UpdateWall { config: crate::state::WallConfig },
    #[serde(rename = "REMOVE_STUDENT")]
    RemoveStudent { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn teacher_meta_decodes_as_teacher() {
        let meta = serde_json::json!({"id": "t1", "name": "Ms. Lan", "role": "teacher"});
        let participant = decode_presence_meta(&meta).unwrap();
        assert!(matches!(
            participant,
            Participant::Teacher { ref id, ref name } if id == "t1" && name == "Ms. Lan"
        ));
    }

    #[test]
    fn student_meta_decodes_with_full_status() {
        let meta = serde_json::json!({
            "id": "s1",
            "name": "An",
            "role": "student",
            "group": "A",
            "avatarSeed": "s1",
            "needsHelp": true,
            "needsHelpAt": 42,
            "isFinished": false,
            "handRaised": false,
        });
        match decode_presence_meta(&meta).unwrap() {
            Participant::Student(status) => {
                assert_eq!(status.id, "s1");
                assert!(status.needs_help);
                assert_eq!(status.needs_help_at, Some(42));
            }
            other => panic!("unexpected participant: {other:?}"),
        }
    }

    #[test]
    fn missing_role_is_treated_as_student() {
        // loose duck-typed acceptance, kept on purpose
        let meta = serde_json::json!({"id": "s9", "name": "Chi"});
        assert!(matches!(
            decode_presence_meta(&meta).unwrap(),
            Participant::Student(_)
        ));
    }

    #[test]
    fn unknown_role_is_treated_as_student() {
        let meta = serde_json::json!({"id": "s9", "name": "Chi", "role": "observer"});
        assert!(matches!(
            decode_presence_meta(&meta).unwrap(),
            Participant::Student(_)
        ));
    }

    #[test]
    fn payload_without_id_or_name_is_dropped() {
        assert!(decode_presence_meta(&serde_json::json!({"name": "Chi"})).is_none());
        assert!(decode_presence_meta(&serde_json::json!({"id": "s9"})).is_none());
        assert!(decode_presence_meta(&serde_json::json!({})).is_none());
        assert!(decode_presence_meta(&serde_json::json!(null)).is_none());
    }

    #[test]
    fn student_presence_payload_includes_role() {
        let status = StudentStatus::new("s1", "An", Some("A".into()));
        let payload = student_presence_payload(&status);
        assert_eq!(payload["role"], "student");
        assert_eq!(payload["id"], "s1");
        assert_eq!(payload["avatarSeed"], "s1");
    }

    #[test]
    fn presence_payload_round_trips() {
        let mut status = StudentStatus::new("s1", "An", None);
        status.set_hand_raised(true, 7);
        let payload = student_presence_payload(&status);
        match decode_presence_meta(&payload).unwrap() {
            Participant::Student(decoded) => assert_eq!(decoded, status),
            other => panic!("unexpected participant: {other:?}"),
        }
    }

    #[test]
    fn control_wire_format() {
        let json = serde_json::to_value(&ControlCommand::ResetBuzzer).unwrap();
        assert_eq!(json["type"], "RESET_BUZZER");

        let command = ControlCommand::RemoveStudent { id: "s1".into() };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "REMOVE_STUDENT");
        assert_eq!(json["id"], "s1");

        let decoded: ControlCommand = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, command);
    }

    #[test]
    fn update_wall_carries_full_config() {
        let command = ControlCommand::UpdateWall {
            config: crate::state::WallConfig {
                is_public: false,
                show_names: false,
                is_locked: true,
                allowed_student_ids: vec!["s1".into()],
            },
        };
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["type"], "UPDATE_WALL");
        assert_eq!(json["config"]["isLocked"], true);
        assert_eq!(json["config"]["allowedStudentIds"][0], "s1");
    }

    #[test]
    fn chat_message_omits_absent_attachments() {
        let message = ChatMessage {
            id: "m1".into(),
            sender_id: "s1".into(),
            sender_name: "An".into(),
            role: Role::Student,
            text: Some("hello".into()),
            image_url: None,
            timestamp: 5,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["senderId"], "s1");
        assert_eq!(json["role"], "student");
        assert!(json.get("imageUrl").is_none());
    }
}
