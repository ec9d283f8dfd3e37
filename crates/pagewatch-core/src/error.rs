//! Error types for the storage layer.

use thiserror::Error;

/// Result alias for store and liveness operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures reading or writing the SQLite database.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// I/O error while preparing the database location.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored timestamp could not be converted back to an instant.
    #[error("corrupt timestamp in column {column}: {value}")]
    Timestamp { column: &'static str, value: i64 },

    /// A record violated the store's invariants before it was written.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
