//! Common error types for the importer

use thiserror::Error;

/// Common result type for importer operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the importer crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration could not be serialized back to TOML
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// No usable ListenBrainz auth token in the configuration
    #[error("ListenBrainz auth_token is missing from {0}")]
    MissingToken(String),
}
