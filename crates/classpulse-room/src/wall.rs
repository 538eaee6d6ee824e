//! Wall moderation policy.
//!
//! Pure predicates evaluated per message per viewer. Enforcement is
//! client-side only; a hostile peer could forge posts, which is an
//! accepted trust assumption for this application.

use base64::Engine;
use classpulse_common::ClasspulseError;

use crate::protocol::{ChatMessage, Role};
use crate::state::{RoomState, WallConfig};

/// Whether `viewer` gets to see `message`.
///
/// Teacher-authored messages are visible to everyone; teachers see the
/// whole wall; otherwise visibility follows `is_public`, falling back to
/// own-messages-only.
pub fn is_message_visible(
    message: &ChatMessage,
    viewer_id: &str,
    viewer_role: Role,
    config: &WallConfig,
) -> bool {
    if message.role == Role::Teacher || viewer_role == Role::Teacher {
        return true;
    }
    config.is_public || message.sender_id == viewer_id
}

/// Whether the author's name is disclosed to `viewer`. When false the UI
/// renders an anonymized placeholder instead.
pub fn shows_author_name(message: &ChatMessage, viewer_id: &str, config: &WallConfig) -> bool {
    message.sender_id == viewer_id || message.role == Role::Teacher || config.show_names
}

/// Whether `sender` may post right now. Teachers always may; students
/// only while the wall is unlocked or they hold an explicit allowance.
pub fn can_post(sender_id: &str, sender_role: Role, config: &WallConfig) -> bool {
    if sender_role == Role::Teacher {
        return true;
    }
    !config.is_locked || config.allowed_student_ids.iter().any(|id| id == sender_id)
}

/// The messages `viewer` gets to see, in arrival order.
pub fn visible_messages<'a>(
    state: &'a RoomState,
    viewer_id: &str,
    viewer_role: Role,
) -> Vec<&'a ChatMessage> {
    state
        .messages
        .iter()
        .filter(|m| is_message_visible(m, viewer_id, viewer_role, &state.wall_config))
        .collect()
}

/// Embed pre-resized JPEG bytes as a data URI for a message payload.
///
/// The resize itself happens upstream; this only bounds what we are
/// willing to push through the relay.
pub fn image_data_uri(jpeg: &[u8], max_bytes: usize) -> Result<String, ClasspulseError> {
    if jpeg.is_empty() {
        return Err(ClasspulseError::Room("empty image attachment".into()));
    }
    if jpeg.len() > max_bytes {
        return Err(ClasspulseError::Room(format!(
            "image attachment too large: {} bytes (max {max_bytes})",
            jpeg.len()
        )));
    }
    let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
    Ok(format!("data:image/jpeg;base64,{encoded}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, sender: &str, role: Role) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            sender_id: sender.into(),
            sender_name: sender.to_uppercase(),
            role,
            text: Some("hello".into()),
            image_url: None,
            timestamp: 1,
        }
    }

    fn private_wall() -> WallConfig {
        WallConfig {
            is_public: false,
            ..WallConfig::default()
        }
    }

    // A private wall hides peers' posts, never the author's own or the
    // teacher's view.
    #[test]
    fn private_wall_visibility() {
        let config = private_wall();
        let m = message("m1", "s1", Role::Student);

        assert!(is_message_visible(&m, "s1", Role::Student, &config));
        assert!(!is_message_visible(&m, "s2", Role::Student, &config));
        assert!(is_message_visible(&m, "t1", Role::Teacher, &config));
    }

    #[test]
    fn teacher_messages_always_visible() {
        let config = private_wall();
        let m = message("m1", "t1", Role::Teacher);
        assert!(is_message_visible(&m, "s2", Role::Student, &config));
    }

    #[test]
    fn public_wall_shows_everything() {
        let config = WallConfig::default();
        let m = message("m1", "s1", Role::Student);
        assert!(is_message_visible(&m, "s2", Role::Student, &config));
    }

    #[test]
    fn name_disclosure() {
        let config = WallConfig {
            show_names: false,
            ..WallConfig::default()
        };
        let m = message("m1", "s1", Role::Student);

        // the author always sees their own name
        assert!(shows_author_name(&m, "s1", &config));
        // peers get the anonymized placeholder
        assert!(!shows_author_name(&m, "s2", &config));
        // teacher-authored posts are always attributed
        let t = message("m2", "t1", Role::Teacher);
        assert!(shows_author_name(&t, "s2", &config));

        let open = WallConfig::default();
        assert!(shows_author_name(&m, "s2", &open));
    }

    #[test]
    fn locked_wall_posting_follows_allow_list() {
        let locked = WallConfig {
            is_locked: true,
            allowed_student_ids: vec![],
            ..WallConfig::default()
        };
        assert!(!can_post("s1", Role::Student, &locked));
        assert!(can_post("t1", Role::Teacher, &locked));

        let allowed = WallConfig {
            is_locked: true,
            allowed_student_ids: vec!["s1".into()],
            ..WallConfig::default()
        };
        assert!(can_post("s1", Role::Student, &allowed));
        assert!(!can_post("s2", Role::Student, &allowed));
    }

    #[test]
    fn unlocked_wall_lets_anyone_post() {
        let config = WallConfig::default();
        assert!(can_post("s1", Role::Student, &config));
    }

    #[test]
    fn visible_messages_filters_per_viewer() {
        let mut state = RoomState::new(16);
        state.wall_config = private_wall();
        state.messages = vec![
            message("m1", "s1", Role::Student),
            message("m2", "s2", Role::Student),
            message("m3", "t1", Role::Teacher),
        ];

        let for_s1: Vec<&str> = visible_messages(&state, "s1", Role::Student)
            .iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(for_s1, vec!["m1", "m3"]);

        let for_teacher = visible_messages(&state, "t1", Role::Teacher);
        assert_eq!(for_teacher.len(), 3);
    }

    #[test]
    fn image_data_uri_encodes_jpeg() {
        let uri = image_data_uri(&[0xff, 0xd8, 0xff], 1024).unwrap();
        assert!(uri.starts_with("data:image/jpeg;base64,"));
    }

    #[test]
    fn image_data_uri_enforces_bounds() {
        assert!(image_data_uri(&[], 1024).is_err());
        let big = vec![0u8; 2048];
        let err = image_data_uri(&big, 1024).unwrap_err();
        assert!(err.to_string().contains("too large"));
    }
}
