pub mod errors;
pub mod id;

pub use errors::{ClasspulseError, ConfigError, RelayError};
pub use id::{new_id, new_short_id};

pub type Result<T> = std::result::Result<T, ClasspulseError>;
