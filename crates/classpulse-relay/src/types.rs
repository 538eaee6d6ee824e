//! Configuration, wire frame, and event/command types for the relay client.

use std::collections::HashMap;

use classpulse_common::RelayError;
use serde::{Deserialize, Serialize};

/// Presence state as delivered by the relay: peer key to the list of
/// tracked payloads ("metas") for that peer.
pub type PresenceMap = HashMap<String, Vec<serde_json::Value>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Connection settings for the relay websocket.
#[derive(Clone)]
pub struct RelayConfig {
    /// Relay project reference (the endpoint subdomain).
    pub project_ref: String,
    /// Publishable API key.
    pub api_key: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl std::fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayConfig")
            .field("project_ref", &self.project_ref)
            .field("api_key", &"[REDACTED]")
            .field("heartbeat_interval_secs", &self.heartbeat_interval_secs)
            .field("reconnect_delay_secs", &self.reconnect_delay_secs)
            .field("max_reconnect_delay_secs", &self.max_reconnect_delay_secs)
            .finish()
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            project_ref: String::new(),
            api_key: String::new(),
            heartbeat_interval_secs: 25,
            reconnect_delay_secs: 1,
            max_reconnect_delay_secs: 30,
        }
    }
}

impl RelayConfig {
    /// Websocket URL for the relay endpoint.
    pub(crate) fn ws_url(&self) -> String {
        format!(
            "wss://{}.supabase.co/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            self.project_ref, self.api_key
        )
    }
}

// ---------------------------------------------------------------------------
// Wire frame
// ---------------------------------------------------------------------------

/// A Phoenix protocol message envelope (v1 JSON format).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayFrame {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
    #[serde(rename = "ref")]
    pub frame_ref: Option<String>,
}

// ---------------------------------------------------------------------------
// Channel options
// ---------------------------------------------------------------------------

/// Per-channel join options.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Receive our own broadcasts back (the relay's "self" flag).
    pub broadcast_self: bool,
    /// Request broadcast acknowledgment from the relay.
    pub ack: bool,
    /// Key under which our tracked payload appears in the presence map.
    pub presence_key: String,
}

impl ChannelOptions {
    /// Options keyed by a peer's session id, with self-broadcasts enabled
    /// so the sender's own reducer sees the same event stream as everyone
    /// else's.
    pub fn keyed_by(presence_key: impl Into<String>) -> Self {
        Self {
            broadcast_self: true,
            ack: false,
            presence_key: presence_key.into(),
        }
    }

    /// Serialize to the JSON payload expected by the relay's join event.
    pub(crate) fn to_join_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "config": {
                "broadcast": {
                    "self": self.broadcast_self,
                    "ack": self.ack
                },
                "presence": {
                    "key": self.presence_key
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Events & commands
// ---------------------------------------------------------------------------

/// Events emitted by the relay client.
#[derive(Debug)]
pub enum RelayEvent {
    /// Websocket connection established.
    Connected,
    /// Websocket connection lost.
    Disconnected,
    /// Successfully joined a channel.
    ChannelJoined { topic: String },
    /// A broadcast event received on a channel.
    Broadcast {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },
    /// Full presence snapshot (delivered after joining and on sync).
    PresenceState { topic: String, state: PresenceMap },
    /// Incremental presence changes.
    PresenceDiff {
        topic: String,
        joins: PresenceMap,
        leaves: PresenceMap,
    },
    /// A failure observed on the connection or a channel.
    Error(RelayError),
}

/// Commands sent to the background connection task.
#[derive(Debug)]
pub(crate) enum RelayCommand {
    Join {
        topic: String,
        options: ChannelOptions,
    },
    Leave {
        topic: String,
    },
    Broadcast {
        topic: String,
        event: String,
        payload: serde_json::Value,
    },
    Track {
        topic: String,
        payload: serde_json::Value,
    },
    Untrack {
        topic: String,
    },
    Shutdown,
}
