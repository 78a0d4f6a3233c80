//! In-memory implementation of the Store trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, NaiveDate};
use warden_core::{ByteRepr, RecordId, RecordRow, Role, Status};

use crate::error::{Result, StoreError};
use crate::traits::{DailyCount, NewRow, Store, UpdateRow};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Records indexed by id.
    records: BTreeMap<RecordId, RecordRow>,

    /// Identity index: identity -> id.
    identities: HashMap<String, RecordId>,

    /// Last id handed out. Ids are never reused.
    last_id: i64,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Internal(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn utc_day(ms: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| StoreError::InvalidData(format!("timestamp out of range: {}", ms)))
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert(&self, row: NewRow) -> Result<RecordId> {
        let mut inner = self.write()?;

        if inner.identities.contains_key(&row.identity) {
            return Err(StoreError::DuplicateIdentity(row.identity));
        }

        inner.last_id += 1;
        let id = RecordId(inner.last_id);

        inner.identities.insert(row.identity.clone(), id);
        inner.records.insert(
            id,
            RecordRow {
                id,
                identity: row.identity,
                digest: ByteRepr::Raw(Bytes::copy_from_slice(row.digest.as_ref())),
                role: row.role,
                status: row.status,
                created_at: row.created_at,
                signature: ByteRepr::Raw(row.signature.0),
            },
        );

        Ok(id)
    }

    async fn update(&self, id: RecordId, row: UpdateRow) -> Result<bool> {
        let mut inner = self.write()?;

        let previous = match inner.records.get(&id) {
            Some(existing) => existing.identity.clone(),
            None => return Ok(false),
        };

        if let Some(holder) = inner.identities.get(&row.identity) {
            if *holder != id {
                return Err(StoreError::DuplicateIdentity(row.identity));
            }
        }

        inner.identities.remove(&previous);
        inner.identities.insert(row.identity.clone(), id);

        if let Some(existing) = inner.records.get_mut(&id) {
            existing.identity = row.identity;
            existing.digest = ByteRepr::Raw(Bytes::copy_from_slice(row.digest.as_ref()));
            existing.role = row.role;
            existing.status = row.status;
            existing.signature = ByteRepr::Raw(row.signature.0);
        }

        Ok(true)
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        let mut inner = self.write()?;

        match inner.records.remove(&id) {
            Some(removed) => {
                inner.identities.remove(&removed.identity);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn get(&self, id: RecordId) -> Result<Option<RecordRow>> {
        let inner = self.read()?;
        Ok(inner.records.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<RecordRow>> {
        let inner = self.read()?;
        let mut rows: Vec<RecordRow> = inner.records.values().cloned().collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<RecordRow>> {
        let inner = self.read()?;
        Ok(inner
            .identities
            .get(identity)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn count(&self) -> Result<u64> {
        let inner = self.read()?;
        Ok(inner.records.len() as u64)
    }

    async fn count_by_role(&self) -> Result<Vec<(Role, u64)>> {
        let inner = self.read()?;
        Ok(Role::ALL
            .into_iter()
            .map(|role| {
                let n = inner.records.values().filter(|r| r.role == role).count();
                (role, n as u64)
            })
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    async fn count_by_status(&self) -> Result<Vec<(Status, u64)>> {
        let inner = self.read()?;
        Ok(Status::ALL
            .into_iter()
            .map(|status| {
                let n = inner.records.values().filter(|r| r.status == status).count();
                (status, n as u64)
            })
            .filter(|(_, n)| *n > 0)
            .collect())
    }

    async fn daily_created_since(&self, since_ms: i64) -> Result<Vec<DailyCount>> {
        let inner = self.read()?;

        let mut buckets: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for record in inner.records.values().filter(|r| r.created_at >= since_ms) {
            *buckets.entry(utc_day(record.created_at)?).or_insert(0) += 1;
        }

        Ok(buckets
            .into_iter()
            .map(|(day, count)| DailyCount { day, count })
            .collect())
    }
}
