//! Error types for the export module.

use thiserror::Error;
use warden_core::CoreError;

/// Errors that can occur during an export run.
///
/// Per-record verification failures are not errors: they are filtered out
/// and counted in the report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The source could not deliver the key or the batch.
    #[error("source error: {0}")]
    Source(String),

    /// Key import or batch decoding failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The run was cancelled before it settled.
    #[error("export cancelled")]
    Cancelled,

    /// The pipeline was misused or a worker failed outside any record.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
