//! Incoming frame dispatch and presence map parsing.

use classpulse_common::RelayError;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::types::{PresenceMap, RelayEvent, RelayFrame};

/// Strip the relay's topic prefix ("realtime:") from an incoming frame.
fn strip_topic_prefix(topic: &str) -> &str {
    topic.strip_prefix("realtime:").unwrap_or(topic)
}

/// Parse a relay presence map into `key -> Vec<meta>`.
///
/// The relay sends presence as `{ "key": { "metas": [{ ... }] } }`.
pub(crate) fn parse_presence_map(value: &serde_json::Value) -> PresenceMap {
    let mut result = PresenceMap::new();
    if let Some(obj) = value.as_object() {
        for (key, val) in obj {
            if let Some(metas) = val.get("metas").and_then(|m| m.as_array()) {
                result.insert(key.clone(), metas.clone());
            }
        }
    }
    result
}

/// Translate a single incoming frame into a `RelayEvent`.
pub(crate) async fn dispatch_frame(frame: &RelayFrame, event_tx: &mpsc::Sender<RelayEvent>) {
    let topic = strip_topic_prefix(&frame.topic);

    match frame.event.as_str() {
        "phx_reply" => {
            let status = frame.payload.get("status").and_then(|s| s.as_str());
            match status {
                Some("ok") => {
                    debug!(topic = %topic, "channel reply: ok");
                    let _ = event_tx
                        .send(RelayEvent::ChannelJoined {
                            topic: topic.to_string(),
                        })
                        .await;
                }
                Some(status) => {
                    let message = frame
                        .payload
                        .get("response")
                        .and_then(|r| r.get("reason"))
                        .and_then(|r| r.as_str())
                        .unwrap_or("unknown error")
                        .to_string();
                    warn!(topic = %topic, status = %status, "channel reply error");
                    let _ = event_tx
                        .send(RelayEvent::Error(RelayError::Channel {
                            topic: topic.to_string(),
                            message,
                        }))
                        .await;
                }
                None => {}
            }
        }
        "phx_error" | "phx_close" => {
            info!(topic = %topic, event = %frame.event, "channel terminated");
            let _ = event_tx
                .send(RelayEvent::Error(RelayError::Channel {
                    topic: topic.to_string(),
                    message: frame.event.clone(),
                }))
                .await;
        }
        "broadcast" => {
            let inner_event = frame
                .payload
                .get("event")
                .and_then(|e| e.as_str())
                .unwrap_or("unknown")
                .to_string();
            let inner_payload = frame
                .payload
                .get("payload")
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            debug!(topic = %topic, event = %inner_event, "broadcast received");
            let _ = event_tx
                .send(RelayEvent::Broadcast {
                    topic: topic.to_string(),
                    event: inner_event,
                    payload: inner_payload,
                })
                .await;
        }
        "presence_state" => {
            let state = parse_presence_map(&frame.payload);
            debug!(topic = %topic, peers = state.len(), "presence snapshot received");
            let _ = event_tx
                .send(RelayEvent::PresenceState {
                    topic: topic.to_string(),
                    state,
                })
                .await;
        }
        "presence_diff" => {
            let joins = frame
                .payload
                .get("joins")
                .map(parse_presence_map)
                .unwrap_or_default();
            let leaves = frame
                .payload
                .get("leaves")
                .map(parse_presence_map)
                .unwrap_or_default();
            debug!(topic = %topic, joins = joins.len(), leaves = leaves.len(), "presence diff received");
            let _ = event_tx
                .send(RelayEvent::PresenceDiff {
                    topic: topic.to_string(),
                    joins,
                    leaves,
                })
                .await;
        }
        _ => {
            debug!(topic = %topic, event = %frame.event, "unhandled relay event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, payload: serde_json::Value) -> RelayFrame {
        RelayFrame {
            topic: "realtime:classroom-room-5a2".into(),
            event: event.into(),
            payload,
            frame_ref: None,
        }
    }

    async fn dispatch(frame: &RelayFrame) -> RelayEvent {
        let (tx, mut rx) = mpsc::channel(8);
        dispatch_frame(frame, &tx).await;
        rx.try_recv().expect("expected an event")
    }

    #[test]
    fn presence_map_parses_metas() {
        let value = serde_json::json!({
            "s1": { "metas": [{ "id": "s1", "name": "An" }] },
            "s2": { "metas": [{ "id": "s2", "name": "Binh" }, { "id": "s2" }] },
        });
        let map = parse_presence_map(&value);
        assert_eq!(map.len(), 2);
        assert_eq!(map["s1"].len(), 1);
        assert_eq!(map["s2"].len(), 2);
    }

    #[test]
    fn presence_map_skips_entries_without_metas() {
        let value = serde_json::json!({
            "s1": { "metas": [{}] },
            "bogus": 42,
        });
        let map = parse_presence_map(&value);
        assert_eq!(map.len(), 1);
        assert!(map.contains_key("s1"));
    }

    #[tokio::test]
    async fn ok_reply_becomes_channel_joined() {
        let event = dispatch(&frame("phx_reply", serde_json::json!({"status": "ok"}))).await;
        assert!(
            matches!(event, RelayEvent::ChannelJoined { topic } if topic == "classroom-room-5a2")
        );
    }

    #[tokio::test]
    async fn error_reply_becomes_channel_error() {
        let event = dispatch(&frame(
            "phx_reply",
            serde_json::json!({"status": "error", "response": {"reason": "join refused"}}),
        ))
        .await;
        match event {
            RelayEvent::Error(RelayError::Channel { topic, message }) => {
                assert_eq!(topic, "classroom-room-5a2");
                assert_eq!(message, "join refused");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn broadcast_unwraps_inner_event() {
        let event = dispatch(&frame(
            "broadcast",
            serde_json::json!({"event": "buzzer", "payload": {"id": "s1"}}),
        ))
        .await;
        match event {
            RelayEvent::Broadcast { event, payload, .. } => {
                assert_eq!(event, "buzzer");
                assert_eq!(payload["id"], "s1");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn presence_state_carries_full_map() {
        let event = dispatch(&frame(
            "presence_state",
            serde_json::json!({"s1": {"metas": [{"id": "s1"}]}}),
        ))
        .await;
        match event {
            RelayEvent::PresenceState { state, .. } => assert_eq!(state.len(), 1),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn presence_diff_splits_joins_and_leaves() {
        let event = dispatch(&frame(
            "presence_diff",
            serde_json::json!({
                "joins": {"s2": {"metas": [{"id": "s2"}]}},
                "leaves": {"s1": {"metas": [{"id": "s1"}]}},
            }),
        ))
        .await;
        match event {
            RelayEvent::PresenceDiff { joins, leaves, .. } => {
                assert!(joins.contains_key("s2"));
                assert!(leaves.contains_key("s1"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
