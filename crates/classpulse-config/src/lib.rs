//! classpulse configuration system.
//!
//! TOML-based configuration with environment-variable overrides for
//! credentials. All sections use serde defaults so partial configs work
//! out of the box, and a missing config file is not an error.

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{AdviceSettings, ClasspulseConfig, RelaySettings, RoomSettings};
pub use toml_loader::{apply_env_overrides, default_config_path, load_from_path};

use classpulse_common::ConfigError;
use std::path::Path;

/// Load config from an explicit path or the platform default, overlay
/// environment credentials, and validate.
pub fn load_config(path_override: Option<&Path>) -> Result<ClasspulseConfig, ConfigError> {
    let mut config = match path_override {
        Some(path) => toml_loader::load_from_path(path)?,
        None => toml_loader::load_default()?,
    };

    toml_loader::apply_env_overrides(&mut config);
    validation::validate(&config)?;
    Ok(config)
}
