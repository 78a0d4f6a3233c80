//! # Warden Store
//!
//! Storage abstraction for Warden. Provides a trait-based interface for
//! record persistence with SQLite and in-memory implementations, plus the
//! file-backed key store.
//!
//! ## Overview
//!
//! The store module abstracts record storage behind the [`Store`] trait,
//! allowing the registry to be storage-agnostic. The primary implementation
//! is [`SqliteStore`], with [`MemoryStore`] for testing.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`FileKeyStore`] - PEM key pair persisted in a key directory
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_store::{FileKeyStore, SqliteStore, Store};
//!
//! async fn example() {
//!     let store = SqliteStore::open("warden.db").unwrap();
//!     let keys = FileKeyStore::open("keys").unwrap();
//!
//!     let total = store.count().await.unwrap();
//!     println!("{} records, key {}", total, keys.public_pem());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Unique identities**: a duplicate identity fails with `DuplicateIdentity`
//! - **Opaque attestation**: digest and signature bytes are stored verbatim
//! - **First-run keys**: an empty key directory gets a fresh pair, once

pub mod error;
pub mod keystore;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use keystore::FileKeyStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{DailyCount, NewRow, Store, UpdateRow};
