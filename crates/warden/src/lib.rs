//! # Warden
//!
//! An administrative record registry whose exports can be verified by a
//! remote consumer without trusting the transport or the exporter.
//!
//! ## Overview
//!
//! - **Write path**: every record's identity string is hashed (SHA-384) and
//!   signed (Ed25519) when it is written
//! - **Export**: the full record set is encoded into a versioned CBOR batch
//! - **Verify**: the consumer decodes the batch and keeps only records whose
//!   signature validates against the published key
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use warden::{NewRecord, Registry, RegistryConfig};
//! use warden::store::{FileKeyStore, SqliteStore};
//!
//! async fn example() {
//!     let keys = Arc::new(FileKeyStore::open("keys").unwrap());
//!     let store = SqliteStore::open("warden.db").unwrap();
//!     let registry = Registry::new(keys, store, RegistryConfig::default());
//!
//!     registry.create(NewRecord::new("ops@example.com")).await.unwrap();
//!
//!     let batch = registry.export().await.unwrap();
//!     let public_key = registry.public_key_pem().unwrap();
//!     // Ship `batch` and `public_key` to the consumer.
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `warden::core` - Digests, signatures, codec and verification
//! - `warden::store` - Storage abstraction, SQLite and key files
//! - `warden::export` - Consumer-side export pipeline

pub mod error;
pub mod registry;
pub mod source;

// Re-export component crates
pub use warden_core as core;
pub use warden_export as export;
pub use warden_store as store;

// Re-export main types for convenience
pub use error::{RegistryError, Result};
pub use registry::{Health, NewRecord, RecordCounts, RecordUpdate, Registry, RegistryConfig};
pub use source::LocalSource;

// Re-export commonly used core types
pub use warden_core::{
    decode_batch, encode_batch, verify_record, IdentityDigest, IdentitySigner, KeyPairProvider,
    Keypair, Record, RecordId, RecordSignature, Role, Status, VerificationKey,
};
pub use warden_export::{ExportConfig, ExportPipeline, ExportReport, MemorySource};
