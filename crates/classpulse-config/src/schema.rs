//! Configuration schema for classpulse.
//!
//! All structs use `serde(default)` so partial configs work correctly.

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Relay Config
// =============================================================================

/// Connection settings for the realtime pub/sub relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Relay project reference (the subdomain of the relay endpoint).
    pub project_ref: String,
    /// Publishable relay API key.
    pub api_key: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub max_reconnect_delay_secs: u64,
}

impl Default for RelaySettings {
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

impl RelaySettings {
    /// Whether usable credentials are present. A config without them still
    /// loads; the adapter just stays in its waiting state.
    pub fn has_credentials(&self) -> bool {
        !self.project_ref.is_empty() && !self.api_key.is_empty()
    }
}

// =============================================================================
// Room Config
// =============================================================================

/// Room behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    /// Shared passphrase required to join as the teacher. Compared
    /// client-side only; there is no server verification.
    pub teacher_passphrase: String,
    /// Upper bound on an embedded image data URI, in bytes.
    pub max_image_bytes: usize,
    /// How many recent message ids to remember for redelivery de-dup.
    pub dedup_window: usize,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            teacher_passphrase: "giaovien".into(),
            max_image_bytes: 512 * 1024,
            dedup_window: 256,
        }
    }
}

// =============================================================================
// Advice Config
// =============================================================================

/// Settings for the teacher-assistant advice service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdviceSettings {
    /// Gemini API key. Empty disables the assistant.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Max output tokens per reply.
    pub max_tokens: u32,
}

impl Default for AdviceSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gemini-2.5-flash".into(),
            max_tokens: 1024,
        }
    }
}

// =============================================================================
// Root Config
// =============================================================================

/// Root configuration for classpulse.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClasspulseConfig {
    pub relay: RelaySettings,
    pub room: RoomSettings,
    pub advice: AdviceSettings,
}
