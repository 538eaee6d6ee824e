//! TOML config file loading.

use crate::schema::ClasspulseConfig;
use classpulse_common::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Load config from a specific TOML file path.
///
/// Missing fields are filled from serde defaults, so a partial file works.
pub fn load_from_path(path: &Path) -> Result<ClasspulseConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: ClasspulseConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load config from the platform-specific default path.
///
/// If the file does not exist, defaults are returned without creating it;
/// the tool is expected to run fine with credentials supplied via the
/// environment instead.
pub fn load_default() -> Result<ClasspulseConfig, ConfigError> {
    let path = default_config_path()?;

    if !path.exists() {
        info!("no config found at {}, using defaults", path.display());
        return Ok(ClasspulseConfig::default());
    }

    load_from_path(&path)
}

/// Platform-specific default config file path.
///
/// On macOS: `~/Library/Application Support/classpulse/config.toml`
/// On Linux: `~/.config/classpulse/config.toml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("classpulse").join("config.toml"))
}

/// Overlay credentials from the environment onto a loaded config.
///
/// `CLASSPULSE_RELAY_REF`, `CLASSPULSE_RELAY_KEY`, and `CLASSPULSE_AI_KEY`
/// take precedence over file values when set and non-empty.
pub fn apply_env_overrides(config: &mut ClasspulseConfig) {
    if let Ok(v) = std::env::var("CLASSPULSE_RELAY_REF") {
        if !v.is_empty() {
            config.relay.project_ref = v;
        }
    }
    if let Ok(v) = std::env::var("CLASSPULSE_RELAY_KEY") {
        if !v.is_empty() {
            config.relay.api_key = v;
        }
    }
    if let Ok(v) = std::env::var("CLASSPULSE_AI_KEY") {
        if !v.is_empty() {
            config.advice.api_key = v;
        }
    }

    if !config.relay.has_credentials() {
        warn!("relay credentials missing; the room adapter will stay in waiting state");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_missing_file_is_not_found() {
        let err = load_from_path(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[relay]\nproject_ref = \"abc\"\napi_key = \"key\"\n\n[room]\nteacher_passphrase = \"s3cret\""
        )
        .unwrap();

        let config = load_from_path(file.path()).unwrap();
        assert_eq!(config.relay.project_ref, "abc");
        assert_eq!(config.room.teacher_passphrase, "s3cret");
        // untouched section keeps defaults
        assert_eq!(config.advice.max_tokens, 1024);
    }

    #[test]
    fn load_invalid_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay\nbroken").unwrap();

        let err = load_from_path(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let mut config = ClasspulseConfig::default();
        config.relay.project_ref = "from-file".into();

        std::env::set_var("CLASSPULSE_RELAY_REF", "from-env");
        std::env::set_var("CLASSPULSE_RELAY_KEY", "env-key");
        apply_env_overrides(&mut config);
        std::env::remove_var("CLASSPULSE_RELAY_REF");
        std::env::remove_var("CLASSPULSE_RELAY_KEY");

        assert_eq!(config.relay.project_ref, "from-env");
        assert_eq!(config.relay.api_key, "env-key");
    }
}
