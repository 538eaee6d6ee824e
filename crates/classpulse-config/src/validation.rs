//! Configuration validation.
//!
//! Numeric ranges are hard errors; missing credentials are not (the app
//! degrades to a waiting adapter instead, per the connectivity model).

use crate::schema::ClasspulseConfig;
use classpulse_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &ClasspulseConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    if config.relay.heartbeat_interval_secs == 0 {
        errors.push("relay.heartbeat_interval_secs must be positive".into());
    }
    if config.relay.reconnect_delay_secs == 0 {
        errors.push("relay.reconnect_delay_secs must be positive".into());
    }
    if config.relay.max_reconnect_delay_secs < config.relay.reconnect_delay_secs {
        errors.push("relay.max_reconnect_delay_secs must be >= relay.reconnect_delay_secs".into());
    }
    if config.room.teacher_passphrase.is_empty() {
        errors.push("room.teacher_passphrase must not be empty".into());
    }
    if config.room.dedup_window == 0 {
        errors.push("room.dedup_window must be positive".into());
    }
    if config.room.max_image_bytes == 0 {
        errors.push("room.max_image_bytes must be positive".into());
    }
    if config.advice.max_tokens == 0 {
        errors.push("advice.max_tokens must be positive".into());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(validate(&ClasspulseConfig::default()).is_ok());
    }

    #[test]
    fn zero_heartbeat_rejected() {
        let mut config = ClasspulseConfig::default();
        config.relay.heartbeat_interval_secs = 0;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("heartbeat_interval_secs"));
    }

    #[test]
    fn inverted_reconnect_delays_rejected() {
        let mut config = ClasspulseConfig::default();
        config.relay.reconnect_delay_secs = 60;
        config.relay.max_reconnect_delay_secs = 30;
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("max_reconnect_delay_secs"));
    }

    #[test]
    fn empty_passphrase_rejected() {
        let mut config = ClasspulseConfig::default();
        config.room.teacher_passphrase.clear();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("teacher_passphrase"));
    }

    #[test]
    fn errors_are_collected() {
        let mut config = ClasspulseConfig::default();
        config.relay.heartbeat_interval_secs = 0;
        config.room.dedup_window = 0;
        let err = validate(&config).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("heartbeat_interval_secs"));
        assert!(msg.contains("dedup_window"));
    }

    #[test]
    fn missing_credentials_still_validate() {
        // Connectivity degradation is handled at runtime, not load time.
        let config = ClasspulseConfig::default();
        assert!(!config.relay.has_credentials());
        assert!(validate(&config).is_ok());
    }
}
