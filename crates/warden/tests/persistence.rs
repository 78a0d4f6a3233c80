//! Key files and the SQLite store survive a restart.

use std::sync::Arc;

use anyhow::Result;
use warden::core::KeyPairProvider;
use warden::store::{FileKeyStore, SqliteStore};
use warden::{ExportPipeline, MemorySource, NewRecord, Registry, RegistryConfig, Status};

#[tokio::test]
async fn test_restart_keeps_keys_and_records() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let key_dir = dir.path().join("keys");
    let db_path = dir.path().join("warden.db");

    let (first_pem, created) = {
        let keys = Arc::new(FileKeyStore::open(&key_dir)?);
        let registry = Registry::new(keys, SqliteStore::open(&db_path)?, RegistryConfig::default());
        let created = registry
            .create(NewRecord::new("ops@example.com").status(Status::Inactive))
            .await?;
        (registry.public_key_pem()?, created)
    };

    let keys = Arc::new(FileKeyStore::open(&key_dir)?);
    let registry = Registry::new(keys, SqliteStore::open(&db_path)?, RegistryConfig::default());

    assert_eq!(registry.public_key_pem()?, first_pem);
    assert_eq!(registry.get(created.id).await?, created);

    let report = registry_export_report(&registry).await?;
    assert_eq!(report.verified, vec![created]);
    Ok(())
}

#[tokio::test]
async fn test_consumer_verifies_with_public_file_only() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let keys = Arc::new(FileKeyStore::open(dir.path())?);
    let registry = Registry::new(keys, SqliteStore::open_memory()?, RegistryConfig::default());
    registry.create(NewRecord::new("a@example.com")).await?;
    registry.create(NewRecord::new("b@example.com")).await?;

    let consumer_keys = FileKeyStore::open_verify_only(dir.path())?;
    assert!(consumer_keys.signing_key().is_err());

    let source = MemorySource::new(consumer_keys.public_pem(), registry.export().await?);
    let report = ExportPipeline::new(source).run().await?;
    assert_eq!(report.verified.len(), 2);
    Ok(())
}

async fn registry_export_report(
    registry: &Registry<SqliteStore>,
) -> Result<warden::ExportReport> {
    let source = MemorySource::new(registry.public_key_pem()?, registry.export().await?);
    Ok(ExportPipeline::new(source).run().await?)
}
