//! # Warden Export
//!
//! Consumer side of the record pipeline: fetch a public key and an encoded
//! batch from an untrusted source, decode it, and keep only the records whose
//! signatures verify.
//!
//! ## Key Properties
//!
//! - **Fail closed**: key or schema errors fail the whole run
//! - **Per-record isolation**: one bad record never aborts the batch
//! - **Order preserving**: verified records keep their decoded order
//! - **Cancellable**: a cancelled run exposes nothing
//!
//! ## Usage
//!
//! ```rust,no_run
//! use warden_export::{ExportConfig, ExportPipeline, MemorySource};
//!
//! async fn example(public_key_pem: String, batch: Vec<u8>) {
//!     let source = MemorySource::new(public_key_pem, batch);
//!     let mut pipeline = ExportPipeline::with_config(source, ExportConfig::default());
//!
//!     let report = pipeline.run().await.unwrap();
//!     println!("{} of {} records verified", report.verified.len(), report.total);
//! }
//! ```

pub mod error;
pub mod pipeline;
pub mod source;

pub use error::{ExportError, Result};
pub use pipeline::{
    ExportConfig, ExportPipeline, ExportReport, ExportState, RecordOutcome, Settlement,
};
pub use source::{ExportSource, MemorySource};
