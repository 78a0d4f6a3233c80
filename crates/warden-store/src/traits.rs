//! Store trait: the abstract interface for record persistence.
//!
//! This trait allows the registry to be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use warden_core::{IdentityDigest, RecordId, RecordRow, RecordSignature, Role, Status};

use crate::error::Result;

/// A record about to be inserted. The store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    pub identity: String,
    pub digest: IdentityDigest,
    pub role: Role,
    pub status: Status,
    /// Creation time, Unix milliseconds.
    pub created_at: i64,
    pub signature: RecordSignature,
}

/// Full replacement of a record's mutable columns. `created_at` never changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateRow {
    pub identity: String,
    pub digest: IdentityDigest,
    pub role: Role,
    pub status: Status,
    pub signature: RecordSignature,
}

/// Number of records created on one UTC calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub day: NaiveDate,
    pub count: u64,
}

/// The Store trait: async interface for record persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, we use `spawn_blocking` internally to avoid blocking the runtime.
///
/// # Design Notes
///
/// - **Unique identities**: inserting or updating to an identity another
///   record holds fails with [`StoreError::DuplicateIdentity`].
/// - **Ordering**: [`Store::list`] returns newest first by `created_at`,
///   breaking ties by id descending.
/// - **Opaque attestation**: digest and signature are stored and returned
///   byte-for-byte; the store never interprets them.
///
/// [`StoreError::DuplicateIdentity`]: crate::StoreError::DuplicateIdentity
#[async_trait]
pub trait Store: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Record Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a record, returning its assigned id.
    async fn insert(&self, row: NewRow) -> Result<RecordId>;

    /// Replace a record's mutable columns. Returns `false` if no such id.
    async fn update(&self, id: RecordId, row: UpdateRow) -> Result<bool>;

    /// Delete a record. Returns `false` if no such id.
    async fn delete(&self, id: RecordId) -> Result<bool>;

    /// Get a record by id.
    async fn get(&self, id: RecordId) -> Result<Option<RecordRow>>;

    /// All records, newest first.
    async fn list(&self) -> Result<Vec<RecordRow>>;

    /// Get a record by its identity string.
    async fn find_by_identity(&self, identity: &str) -> Result<Option<RecordRow>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Statistics
    // ─────────────────────────────────────────────────────────────────────────

    /// Total number of records.
    async fn count(&self) -> Result<u64>;

    /// Record counts per role. Roles with no records are omitted.
    async fn count_by_role(&self) -> Result<Vec<(Role, u64)>>;

    /// Record counts per status. Statuses with no records are omitted.
    async fn count_by_status(&self) -> Result<Vec<(Status, u64)>>;

    /// Records created per UTC day at or after `since_ms`, oldest day first.
    async fn daily_created_since(&self, since_ms: i64) -> Result<Vec<DailyCount>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_count_serializes_day_as_date() {
        let count = DailyCount {
            day: NaiveDate::from_ymd_opt(2025, 1, 14).unwrap(),
            count: 3,
        };
        let json = serde_json::to_string(&count).unwrap();
        assert_eq!(json, r#"{"day":"2025-01-14","count":3}"#);
        assert_eq!(serde_json::from_str::<DailyCount>(&json).unwrap(), count);
    }
}
