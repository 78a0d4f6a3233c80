//! Consumer-side signature verification.
//!
//! Verification checks that a stored signature was produced by the holder of
//! the private key for the stored digest. It deliberately does not re-hash
//! the identity string: the stored digest is trusted as-is. Callers that need
//! freshness compare [`digest_is_fresh`] separately.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier};
use thiserror::Error;

use crate::codec::MalformedRecord;
use crate::crypto::{IdentityDigest, VerificationKey, DIGEST_LEN};
use crate::error::{CoreError, Result};
use crate::types::Record;

/// Why a single digest/signature pair did not verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("digest is empty")]
    EmptyDigest,

    #[error("signature is empty")]
    EmptySignature,

    /// The signature bytes cannot be an Ed25519 signature.
    #[error("signature scheme mismatch: {len} bytes is not an Ed25519 signature")]
    SchemeMismatch { len: usize },

    #[error("signature does not match digest")]
    Mismatch,

    #[error("digest is {len} bytes, not a SHA-384 digest")]
    DigestLength { len: usize },

    /// The record could not be decoded, so there is nothing to verify.
    #[error("record is malformed")]
    Malformed,

    /// Verification ran out of band and never reported back.
    #[error("verification aborted")]
    Aborted,
}

/// Outcome of verifying one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Verified,
    Rejected(VerificationFailure),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

/// Import a verification key from its transported form.
///
/// Accepts an SPKI PEM document, or the bare base64 body of one with the
/// armor lines already stripped.
pub fn import_verification_key(material: &str) -> Result<VerificationKey> {
    let trimmed = material.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidKeyMaterial("empty key material".into()));
    }

    if trimmed.contains("-----BEGIN") {
        return VerificationKey::from_pem(trimmed);
    }

    let body: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    let der = STANDARD
        .decode(body.as_bytes())
        .map_err(|e| CoreError::InvalidKeyMaterial(format!("not PEM or base64 DER: {}", e)))?;
    VerificationKey::from_der(&der)
}

/// Check a digest/signature pair, reporting why it fails.
pub fn check(
    digest: &[u8],
    signature: &[u8],
    key: &VerificationKey,
) -> std::result::Result<(), VerificationFailure> {
    if digest.is_empty() {
        return Err(VerificationFailure::EmptyDigest);
    }
    if signature.is_empty() {
        return Err(VerificationFailure::EmptySignature);
    }

    let sig = Signature::from_slice(signature).map_err(|_| VerificationFailure::SchemeMismatch {
        len: signature.len(),
    })?;

    key.inner()
        .verify(digest, &sig)
        .map_err(|_| VerificationFailure::Mismatch)
}

/// `true` iff the signature over the digest verifies under `key`. Never fails.
pub fn verify(digest: &[u8], signature: &[u8], key: &VerificationKey) -> bool {
    check(digest, signature, key).is_ok()
}

/// Verdict for a record, using its stored digest and signature as-is.
pub fn verdict(record: &Record, key: &VerificationKey) -> Verdict {
    match check(record.digest.as_ref(), record.signature.as_bytes(), key) {
        Ok(()) => Verdict::Verified,
        Err(failure) => Verdict::Rejected(failure),
    }
}

/// Verdict for a batch entry that did not decode. Always a rejection.
pub fn malformed_verdict(entry: &MalformedRecord) -> Verdict {
    let failure = match entry.digest.as_deref() {
        Some([]) => VerificationFailure::EmptyDigest,
        Some(digest) if digest.len() != DIGEST_LEN => {
            VerificationFailure::DigestLength { len: digest.len() }
        }
        _ => VerificationFailure::Malformed,
    };
    Verdict::Rejected(failure)
}

/// `true` iff the record's stored signature verifies for its stored digest.
pub fn verify_record(record: &Record, key: &VerificationKey) -> bool {
    verdict(record, key).is_verified()
}

/// Whether the stored digest still matches the identity string.
pub fn digest_is_fresh(record: &Record) -> bool {
    IdentityDigest::hash(record.identity.as_bytes()) == record.digest
}
