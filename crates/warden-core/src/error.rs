//! Error types for Warden Core.

use thiserror::Error;

use crate::verifier::VerificationFailure;

/// Core errors that can occur while signing, encoding, decoding or verifying records.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Persisted key material exists but could not be parsed.
    #[error("key material corrupt: {0}")]
    KeyMaterialCorrupt(String),

    /// The key provider cannot supply a private key.
    #[error("signing key unavailable: {0}")]
    SigningKeyUnavailable(String),

    /// A verification key handed to us is malformed.
    #[error("invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// A record does not satisfy the batch schema after normalization.
    #[error("encode validation error: {0}")]
    EncodeValidation(String),

    /// Corrupt, truncated or malformed batch bytes.
    #[error("decoding error: {0}")]
    Decode(String),

    /// The batch was written under a schema version we do not speak.
    #[error("schema mismatch: expected version {expected}, found {found:?}")]
    SchemaMismatch { expected: u64, found: Option<u64> },

    /// A single record failed verification. Never fatal to a batch.
    #[error("verification failed: {0}")]
    VerificationFailed(VerificationFailure),

    /// The identity string does not have the expected shape.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

impl From<VerificationFailure> for CoreError {
    fn from(failure: VerificationFailure) -> Self {
        CoreError::VerificationFailed(failure)
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
