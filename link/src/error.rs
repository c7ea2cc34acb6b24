//! Error types for link registry operations.
//!
//! Configuration and open failures are always reported; statement failures
//! may be suppressed per link through `silent_errors`.

use thiserror::Error;

/// Errors that can occur while configuring, opening or querying links.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Missing or malformed link configuration.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// The driver failed to open the database for a link.
    #[error("failed to open link '{name}': {source}")]
    ConnectionError {
        name: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Statement preparation or execution failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// File I/O failure (configuration files).
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON configuration parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML configuration parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Convenience alias for results with [`LinkError`].
pub type Result<T> = std::result::Result<T, LinkError>;
