use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("relay connect failed: {0}")]
    ConnectFailed(String),

    #[error("relay connection timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("channel error on {topic}: {message}")]
    Channel { topic: String, message: String },

    #[error("relay send failed: {0}")]
    SendFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ClasspulseError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Relay(#[from] RelayError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("room error: {0}")]
    Room(String),

    #[error("advice error: {0}")]
    Advice(String),

    #[error("{0}")]
    Other(String),
}
