//! The Registry: write path and export surface for Warden records.
//!
//! Every write attests the identity string at write time, so the stored
//! (digest, signature) pair is always ready for export. Role and status
//! changes leave the pair untouched.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;
use warden_core::{
    canonicalize_row, encode_batch, validate_identity, IdentitySigner, KeyPairProvider, Record,
    RecordId, Role, Status,
};
use warden_export::{ExportConfig, ExportPipeline, ExportReport};
use warden_store::{DailyCount, NewRow, Store, UpdateRow};

use crate::error::{RegistryError, Result};
use crate::source::LocalSource;

/// Configuration for the Registry.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Whether to check identity strings for an email-like shape.
    pub validate_identity: bool,
    /// Role given to new records that do not name one.
    pub default_role: Role,
    /// Status given to new records that do not name one.
    pub default_status: Status,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            validate_identity: true,
            default_role: Role::User,
            default_status: Status::Active,
        }
    }
}

/// Input for [`Registry::create`].
#[derive(Debug, Clone, Default)]
pub struct NewRecord {
    pub identity: String,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

impl NewRecord {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// Input for [`Registry::update`]. `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct RecordUpdate {
    pub identity: Option<String>,
    pub role: Option<Role>,
    pub status: Option<Status>,
}

/// Record totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordCounts {
    pub total: u64,
    pub by_role: Vec<(Role, u64)>,
    pub by_status: Vec<(Status, u64)>,
}

/// Liveness snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Health {
    pub records: u64,
    /// Hex of the verification key.
    pub verification_key: String,
    pub signing_available: bool,
}

/// The main Registry struct.
///
/// Provides a unified API for:
/// - Creating, updating and deleting records
/// - Querying records and statistics
/// - Producing the encoded export and the public key that verifies it
pub struct Registry<S: Store> {
    signer: IdentitySigner,
    store: Arc<S>,
    config: RegistryConfig,
}

impl<S: Store> Registry<S> {
    /// Create a new registry.
    pub fn new(keys: Arc<dyn KeyPairProvider>, store: S, config: RegistryConfig) -> Self {
        Self {
            signer: IdentitySigner::new(keys),
            store: Arc::new(store),
            config,
        }
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the signer.
    pub fn signer(&self) -> &IdentitySigner {
        &self.signer
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Write Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a record, attesting its identity.
    pub async fn create(&self, new: NewRecord) -> Result<Record> {
        let identity = self.check_identity(&new.identity)?;

        if self.store.find_by_identity(&identity).await?.is_some() {
            return Err(RegistryError::DuplicateIdentity(identity));
        }

        let (digest, signature) = self.signer.attest(&identity)?;
        let role = new.role.unwrap_or(self.config.default_role);
        let status = new.status.unwrap_or(self.config.default_status);
        let created_at = now_millis();

        let id = self
            .store
            .insert(NewRow {
                identity: identity.clone(),
                digest,
                role,
                status,
                created_at,
                signature: signature.clone(),
            })
            .await?;

        tracing::info!(%id, %role, "created record");

        Ok(Record {
            id,
            identity,
            digest,
            role,
            status,
            created_at,
            signature,
        })
    }

    /// Update a record. The identity is re-attested only if it changed.
    pub async fn update(&self, id: RecordId, update: RecordUpdate) -> Result<Record> {
        let existing = self.get(id).await?;

        let identity = match update.identity.as_deref() {
            Some(identity) => self.check_identity(identity)?,
            None => existing.identity.clone(),
        };
        let identity_changed = identity != existing.identity;

        let (digest, signature) = if identity_changed {
            if let Some(holder) = self.store.find_by_identity(&identity).await? {
                if holder.id != id {
                    return Err(RegistryError::DuplicateIdentity(identity));
                }
            }
            self.signer.attest(&identity)?
        } else {
            (existing.digest, existing.signature.clone())
        };

        let role = update.role.unwrap_or(existing.role);
        let status = update.status.unwrap_or(existing.status);

        let updated = self
            .store
            .update(
                id,
                UpdateRow {
                    identity: identity.clone(),
                    digest,
                    role,
                    status,
                    signature: signature.clone(),
                },
            )
            .await?;
        if !updated {
            return Err(RegistryError::NotFound(id));
        }

        tracing::info!(%id, reattested = identity_changed, "updated record");

        Ok(Record {
            id,
            identity,
            digest,
            role,
            status,
            created_at: existing.created_at,
            signature,
        })
    }

    /// Delete a record.
    pub async fn delete(&self, id: RecordId) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(RegistryError::NotFound(id));
        }
        tracing::info!(%id, "deleted record");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Get a record by id.
    pub async fn get(&self, id: RecordId) -> Result<Record> {
        let row = self
            .store
            .get(id)
            .await?
            .ok_or(RegistryError::NotFound(id))?;
        Ok(canonicalize_row(&row)?)
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<Record>> {
        let rows = self.store.list().await?;
        rows.iter()
            .map(|row| canonicalize_row(row).map_err(RegistryError::from))
            .collect()
    }

    /// Record totals by role and status.
    pub async fn counts(&self) -> Result<RecordCounts> {
        Ok(RecordCounts {
            total: self.store.count().await?,
            by_role: self.store.count_by_role().await?,
            by_status: self.store.count_by_status().await?,
        })
    }

    /// Records created per UTC day over the last `days` days, today included.
    pub async fn daily_stats(&self, days: u32) -> Result<Vec<DailyCount>> {
        self.daily_stats_at(days, now_millis()).await
    }

    /// [`Registry::daily_stats`] as seen at `now_ms`. Days without records
    /// are reported with a zero count.
    pub async fn daily_stats_at(&self, days: u32, now_ms: i64) -> Result<Vec<DailyCount>> {
        if days == 0 {
            return Ok(Vec::new());
        }

        let today = DateTime::<Utc>::from_timestamp_millis(now_ms)
            .ok_or_else(|| RegistryError::Validation(format!("invalid clock value {}", now_ms)))?
            .date_naive();
        let first = today
            .checked_sub_days(Days::new(u64::from(days) - 1))
            .ok_or_else(|| RegistryError::Validation(format!("{} days is out of range", days)))?;

        let counts = self.store.daily_created_since(day_start_ms(first)).await?;

        Ok(first
            .iter_days()
            .take(days as usize)
            .map(|day| DailyCount {
                day,
                count: counts
                    .iter()
                    .find(|c| c.day == day)
                    .map(|c| c.count)
                    .unwrap_or(0),
            })
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Export Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Encode every record, newest first, into an export batch.
    pub async fn export(&self) -> Result<Vec<u8>> {
        let rows = self.store.list().await?;
        let bytes = encode_batch(&rows)?;
        tracing::debug!(records = rows.len(), len = bytes.len(), "encoded export");
        Ok(bytes)
    }

    /// The verification key as an SPKI PEM document.
    pub fn public_key_pem(&self) -> Result<String> {
        Ok(self.signer.keys().verification_key()?.to_pem()?)
    }

    /// Liveness snapshot.
    pub async fn health(&self) -> Result<Health> {
        let keys = self.signer.keys();
        Ok(Health {
            records: self.store.count().await?,
            verification_key: keys.verification_key()?.to_hex(),
            signing_available: keys.signing_key().is_ok(),
        })
    }

    fn check_identity(&self, identity: &str) -> Result<String> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(RegistryError::Validation("identity is required".into()));
        }
        if self.config.validate_identity {
            validate_identity(identity)?;
        }
        Ok(identity.to_string())
    }
}

impl<S: Store + 'static> Registry<S> {
    /// Run the export pipeline against this registry in-process.
    pub async fn verify_export(self: &Arc<Self>, config: ExportConfig) -> Result<ExportReport> {
        let mut pipeline = ExportPipeline::with_config(LocalSource::new(Arc::clone(self)), config);
        Ok(pipeline.run().await?)
    }
}

fn day_start_ms(day: NaiveDate) -> i64 {
    day.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_core::{verify_record, StaticKeyProvider, VerifyOnlyProvider};
    use warden_store::MemoryStore;

    fn registry() -> Registry<MemoryStore> {
        Registry::new(
            Arc::new(StaticKeyProvider::from_seed(&[0x33; 32])),
            MemoryStore::new(),
            RegistryConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_applies_defaults_and_attests() {
        let registry = registry();
        let record = registry.create(NewRecord::new("ops@example.com")).await.unwrap();

        assert_eq!(record.role, Role::User);
        assert_eq!(record.status, Status::Active);
        assert_eq!(record.digest, IdentitySigner::hash("ops@example.com"));

        let key = registry.signer().keys().verification_key().unwrap();
        assert!(verify_record(&record, &key));
        assert_eq!(registry.get(record.id).await.unwrap(), record);
    }

    #[tokio::test]
    async fn test_create_trims_identity() {
        let registry = registry();
        let record = registry.create(NewRecord::new("  ops@example.com ")).await.unwrap();
        assert_eq!(record.identity, "ops@example.com");
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_and_duplicate() {
        let registry = registry();
        assert!(matches!(
            registry.create(NewRecord::new("not-an-email")).await,
            Err(RegistryError::Validation(_))
        ));
        assert!(matches!(
            registry.create(NewRecord::new("   ")).await,
            Err(RegistryError::Validation(_))
        ));

        registry.create(NewRecord::new("ops@example.com")).await.unwrap();
        assert!(matches!(
            registry.create(NewRecord::new("ops@example.com")).await,
            Err(RegistryError::DuplicateIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_can_be_disabled() {
        let registry = Registry::new(
            Arc::new(StaticKeyProvider::from_seed(&[0x33; 32])),
            MemoryStore::new(),
            RegistryConfig {
                validate_identity: false,
                default_role: Role::Manager,
                default_status: Status::Inactive,
            },
        );
        let record = registry.create(NewRecord::new("legacy-account")).await.unwrap();
        assert_eq!(record.role, Role::Manager);
        assert_eq!(record.status, Status::Inactive);
    }

    #[tokio::test]
    async fn test_role_change_keeps_signature() {
        let registry = registry();
        let created = registry.create(NewRecord::new("ops@example.com")).await.unwrap();

        let updated = registry
            .update(
                created.id,
                RecordUpdate {
                    role: Some(Role::Admin),
                    status: Some(Status::Inactive),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.role, Role::Admin);
        assert_eq!(updated.status, Status::Inactive);
        assert_eq!(updated.digest, created.digest);
        assert_eq!(updated.signature, created.signature);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_identity_change_reattests() {
        let registry = registry();
        let created = registry.create(NewRecord::new("old@example.com")).await.unwrap();

        let updated = registry
            .update(
                created.id,
                RecordUpdate {
                    identity: Some("new@example.com".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.digest, IdentitySigner::hash("new@example.com"));
        assert_ne!(updated.signature, created.signature);
        let key = registry.signer().keys().verification_key().unwrap();
        assert!(verify_record(&updated, &key));
    }

    #[tokio::test]
    async fn test_update_to_taken_identity() {
        let registry = registry();
        registry.create(NewRecord::new("a@example.com")).await.unwrap();
        let b = registry.create(NewRecord::new("b@example.com")).await.unwrap();

        assert!(matches!(
            registry
                .update(
                    b.id,
                    RecordUpdate {
                        identity: Some("a@example.com".into()),
                        ..Default::default()
                    }
                )
                .await,
            Err(RegistryError::DuplicateIdentity(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_record() {
        let registry = registry();
        let id = RecordId(404);
        assert!(matches!(registry.get(id).await, Err(RegistryError::NotFound(_))));
        assert!(matches!(registry.delete(id).await, Err(RegistryError::NotFound(_))));
        assert!(matches!(
            registry.update(id, RecordUpdate::default()).await,
            Err(RegistryError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_counts() {
        let registry = registry();
        registry
            .create(NewRecord::new("a@example.com").role(Role::Admin))
            .await
            .unwrap();
        registry
            .create(NewRecord::new("b@example.com").status(Status::Inactive))
            .await
            .unwrap();

        let counts = registry.counts().await.unwrap();
        assert_eq!(counts.total, 2);
        assert_eq!(counts.by_role, vec![(Role::Admin, 1), (Role::User, 1)]);
        assert_eq!(
            counts.by_status,
            vec![(Status::Active, 1), (Status::Inactive, 1)]
        );
    }

    #[tokio::test]
    async fn test_daily_stats_fills_empty_days() {
        let registry = registry();
        registry.create(NewRecord::new("a@example.com")).await.unwrap();

        let now = now_millis();
        let stats = registry.daily_stats_at(3, now).await.unwrap();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].count, 0);
        assert_eq!(stats[1].count, 0);
        assert_eq!(stats[2].count, 1);
        assert_eq!(stats[2].day, Utc::now().date_naive());

        assert!(registry.daily_stats(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_daily_stats_window_out_of_range() {
        let registry = registry();
        assert!(matches!(
            registry.daily_stats_at(u32::MAX, now_millis()).await,
            Err(RegistryError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_only_registry_cannot_create() {
        let key = StaticKeyProvider::from_seed(&[0x33; 32])
            .verification_key()
            .unwrap();
        let registry = Registry::new(
            Arc::new(VerifyOnlyProvider::new(key)),
            MemoryStore::new(),
            RegistryConfig::default(),
        );

        assert!(matches!(
            registry.create(NewRecord::new("ops@example.com")).await,
            Err(RegistryError::Core(warden_core::CoreError::SigningKeyUnavailable(_)))
        ));
        let health = registry.health().await.unwrap();
        assert!(!health.signing_available);
        assert_eq!(health.records, 0);
    }

    #[tokio::test]
    async fn test_verify_export_roundtrip() {
        let registry = Arc::new(registry());
        for identity in ["a@example.com", "b@example.com", "c@example.com"] {
            registry.create(NewRecord::new(identity)).await.unwrap();
        }

        let report = registry
            .verify_export(ExportConfig::default())
            .await
            .unwrap();
        assert_eq!(report.verified, registry.list().await.unwrap());
        assert_eq!(report.rejected, 0);
    }
}
