//! Error types for the registry.

use thiserror::Error;
use warden_core::{CoreError, RecordId};
use warden_export::ExportError;
use warden_store::StoreError;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The request failed input validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Another record already holds this identity.
    #[error("identity already exists: {0}")]
    DuplicateIdentity(String),

    /// No record with this id.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(StoreError),

    /// Signing, encoding or key error.
    #[error(transparent)]
    Core(CoreError),

    /// Export pipeline error.
    #[error("export error: {0}")]
    Export(#[from] ExportError),
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateIdentity(identity) => RegistryError::DuplicateIdentity(identity),
            StoreError::Core(core) => RegistryError::from(core),
            other => RegistryError::Store(other),
        }
    }
}

impl From<CoreError> for RegistryError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidIdentity(msg) => RegistryError::Validation(msg),
            other => RegistryError::Core(other),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
