//! # Warden Testkit
//!
//! Testing utilities for Warden.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed seeds and records with the exact digests,
//!   signatures and batch bytes every build must reproduce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for setting up test scenarios
//!
//! ## Golden Vectors
//!
//! ```rust
//! use warden_testkit::vectors::verify_all_vectors;
//!
//! for (name, ok, detail) in verify_all_vectors() {
//!     assert!(ok, "{}: {}", name, detail);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use warden_testkit::generators::{record_from_params, RecordParams};
//!
//! proptest! {
//!     #[test]
//!     fn records_verify(params: RecordParams) {
//!         let record = record_from_params(&params);
//!         let key = params.keypair.verification_key();
//!         prop_assert!(warden_core::verify_record(&record, &key));
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use warden_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::with_seed([0x42; 32]);
//! let record = fixture.make_record(1, "ops@example.com");
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{distinct_fixtures, TestFixture};
pub use generators::{record_from_params, RecordParams};
pub use vectors::{all_vectors, records_from_vector, verify_all_vectors, GoldenVector};
