//! Transport abstraction for the export pipeline.
//!
//! A source hands the consumer two opaque blobs: the public key and the
//! encoded batch. Implementations may use HTTP, files, or anything else; the
//! pipeline trusts neither the transport nor the exporting process.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{ExportError, Result};

/// Where an export run fetches its inputs from.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait ExportSource: Send + Sync {
    /// Fetch the public key blob (SPKI PEM, or its bare base64 body).
    async fn fetch_public_key(&self) -> Result<String>;

    /// Fetch the encoded batch, unmodified.
    async fn fetch_export(&self) -> Result<Bytes>;
}

/// A source serving fixed blobs from memory.
///
/// Useful for testing and for replaying a captured export.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    public_key: Option<String>,
    export: Option<Bytes>,
}

impl MemorySource {
    pub fn new(public_key: impl Into<String>, export: impl Into<Bytes>) -> Self {
        Self {
            public_key: Some(public_key.into()),
            export: Some(export.into()),
        }
    }

    /// Replace the served batch.
    pub fn with_export(mut self, export: impl Into<Bytes>) -> Self {
        self.export = Some(export.into());
        self
    }

    /// Replace the served public key.
    pub fn with_public_key(mut self, public_key: impl Into<String>) -> Self {
        self.public_key = Some(public_key.into());
        self
    }
}

#[async_trait]
impl ExportSource for MemorySource {
    async fn fetch_public_key(&self) -> Result<String> {
        self.public_key
            .clone()
            .ok_or_else(|| ExportError::Source("no public key available".into()))
    }

    async fn fetch_export(&self) -> Result<Bytes> {
        self.export
            .clone()
            .ok_or_else(|| ExportError::Source("no export available".into()))
    }
}

#[async_trait]
impl<T: ExportSource + ?Sized> ExportSource for std::sync::Arc<T> {
    async fn fetch_public_key(&self) -> Result<String> {
        (**self).fetch_public_key().await
    }

    async fn fetch_export(&self) -> Result<Bytes> {
        (**self).fetch_export().await
    }
}
