//! Error types for record operations.
//!
//! Every variant is a precondition or driver failure and is returned
//! immediately. "No row found" and "no rows affected" are not errors; they
//! surface as `false` returns and [`Found::Absent`](crate::Found::Absent).

use tablerow_link::LinkError;
use thiserror::Error;

/// Errors that can occur during record and table operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Resolving or opening the link failed.
    #[error("link error: {0}")]
    LinkError(#[from] LinkError),

    /// Statement preparation or execution failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// Table introspection returned no columns.
    #[error("failed to load schema for table '{0}': no columns found")]
    SchemaLoadError(String),

    /// The record or table was constructed without a table name.
    #[error("record is not bound to a table")]
    MissingTableNameError,

    /// A primary-key value required by the operation is absent or null.
    #[error(
        "table '{table}' is missing primary key {}",
        .column.as_deref().unwrap_or("(none declared)")
    )]
    MissingPrimaryKeyError {
        table: String,
        column: Option<String>,
    },

    /// A helper was called in a way it does not support.
    #[error("usage error: {0}")]
    UsageError(String),
}

/// Convenience alias for results with [`RecordError`].
pub type Result<T> = std::result::Result<T, RecordError>;
