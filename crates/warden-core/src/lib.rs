//! # Warden Core
//!
//! Pure primitives for Warden's tamper-evident record pipeline: identity
//! digests, signatures, the batch codec and verification.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over records and key material.
//!
//! ## Key Types
//!
//! - [`Record`] - A registry entry with its identity digest and signature
//! - [`IdentityDigest`] - SHA-384 of the identity string
//! - [`RecordSignature`] - Ed25519 signature over the digest
//! - [`IdentitySigner`] - Write-time hashing and signing
//! - [`KeyPairProvider`] - Source of the deployment key pair
//!
//! ## Pipeline
//!
//! Producers attest identities with [`IdentitySigner`], encode batches with
//! [`encode_batch`], and consumers decode with [`decode_batch`] and check each
//! record with [`verify_record`]. See the [`codec`] module for the wire format.

pub mod codec;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod normalize;
pub mod signer;
pub mod types;
pub mod validation;
pub mod verifier;

pub use codec::{
    canonicalize_row, decode_batch, decode_entries, encode_batch, encode_records, BatchEntry,
    MalformedRecord, SCHEMA_VERSION,
};
pub use crypto::{IdentityDigest, Keypair, RecordSignature, VerificationKey, DIGEST_LEN};
pub use error::{CoreError, Result};
pub use keys::{KeyPairProvider, StaticKeyProvider, VerifyOnlyProvider};
pub use normalize::ByteRepr;
pub use signer::IdentitySigner;
pub use types::{Record, RecordId, RecordRow, Role, Status};
pub use validation::validate_identity;
pub use verifier::{
    check, digest_is_fresh, import_verification_key, malformed_verdict, verdict, verify,
    verify_record, Verdict, VerificationFailure,
};
