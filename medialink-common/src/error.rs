//! Common error types for medialink

use thiserror::Error;

/// Common result type for medialink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across medialink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file could not be parsed
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),
}
