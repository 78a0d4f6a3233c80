//! In-process export source backed by a registry.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use warden_export::{ExportError, ExportSource};
use warden_store::Store;

use crate::registry::Registry;

/// Hands the export pipeline a registry's public key and export, unmodified.
pub struct LocalSource<S: Store> {
    registry: Arc<Registry<S>>,
}

impl<S: Store> LocalSource<S> {
    pub fn new(registry: Arc<Registry<S>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl<S: Store + 'static> ExportSource for LocalSource<S> {
    async fn fetch_public_key(&self) -> warden_export::Result<String> {
        self.registry
            .public_key_pem()
            .map_err(|e| ExportError::Source(e.to_string()))
    }

    async fn fetch_export(&self) -> warden_export::Result<Bytes> {
        self.registry
            .export()
            .await
            .map(Bytes::from)
            .map_err(|e| ExportError::Source(e.to_string()))
    }
}
