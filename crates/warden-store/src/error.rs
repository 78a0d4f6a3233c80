//! Error types for the store module.

use thiserror::Error;
use warden_core::CoreError;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Another record already holds this identity.
    #[error("identity already exists: {0}")]
    DuplicateIdentity(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key material on disk could not be generated or parsed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A blocking task or lock failed underneath a query.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
