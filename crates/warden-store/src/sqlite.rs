//! SQLite implementation of the Store trait.
//!
//! This is the primary storage backend for Warden. It uses rusqlite with
//! bundled SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use warden_core::{ByteRepr, RecordId, RecordRow, Role, Status};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{DailyCount, NewRow, Store, UpdateRow};

const SELECT_RECORD: &str =
    "SELECT id, identity, digest, role, status, created_at, signature FROM records";

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Internal(format!("mutex poisoned: {}", e)))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Internal(format!("spawn_blocking failed: {}", e)))?
    }
}

/// Map a uniqueness violation on `records.identity` to `DuplicateIdentity`.
fn map_write_error(err: rusqlite::Error, identity: &str) -> StoreError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            StoreError::DuplicateIdentity(identity.to_string())
        }
        _ => StoreError::Database(err),
    }
}

fn parse_text_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

// Helper to convert a row to RecordRow
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    let digest: Vec<u8> = row.get(2)?;
    let signature: Vec<u8> = row.get(6)?;

    Ok(RecordRow {
        id: RecordId(row.get(0)?),
        identity: row.get(1)?,
        digest: ByteRepr::Raw(Bytes::from(digest)),
        role: parse_text_column::<Role>(row, 3)?,
        status: parse_text_column::<Status>(row, 4)?,
        created_at: row.get(5)?,
        signature: ByteRepr::Raw(Bytes::from(signature)),
    })
}

fn count_grouped<T>(conn: &Connection, column: &str) -> Result<Vec<(T, u64)>>
where
    T: FromStr<Err = String>,
{
    let sql = format!(
        "SELECT {col}, COUNT(*) FROM records GROUP BY {col}",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let counts = stmt
        .query_map([], |row| {
            let value = parse_text_column::<T>(row, 0)?;
            let count: i64 = row.get(1)?;
            Ok((value, count as u64))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(counts)
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert(&self, row: NewRow) -> Result<RecordId> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (identity, digest, role, status, created_at, signature)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    row.identity,
                    &row.digest.as_bytes()[..],
                    row.role.as_str(),
                    row.status.as_str(),
                    row.created_at,
                    row.signature.as_bytes(),
                ],
            )
            .map_err(|e| map_write_error(e, &row.identity))?;

            Ok(RecordId(conn.last_insert_rowid()))
        })
        .await
    }

    async fn update(&self, id: RecordId, row: UpdateRow) -> Result<bool> {
        self.with_conn(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE records
                     SET identity = ?1, digest = ?2, role = ?3, status = ?4, signature = ?5
                     WHERE id = ?6",
                    params![
                        row.identity,
                        &row.digest.as_bytes()[..],
                        row.role.as_str(),
                        row.status.as_str(),
                        row.signature.as_bytes(),
                        id.0,
                    ],
                )
                .map_err(|e| map_write_error(e, &row.identity))?;

            Ok(changed > 0)
        })
        .await
    }

    async fn delete(&self, id: RecordId) -> Result<bool> {
        self.with_conn(move |conn| {
            let changed = conn.execute("DELETE FROM records WHERE id = ?1", params![id.0])?;
            Ok(changed > 0)
        })
        .await
    }

    async fn get(&self, id: RecordId) -> Result<Option<RecordRow>> {
        self.with_conn(move |conn| {
            let sql = format!("{} WHERE id = ?1", SELECT_RECORD);
            let row = conn
                .query_row(&sql, params![id.0], row_to_record)
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<RecordRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} ORDER BY created_at DESC, id DESC", SELECT_RECORD);
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = Vec::new();
            for row in stmt.query_map([], row_to_record)? {
                match row {
                    Ok(row) => rows.push(row),
                    // One unreadable row must not hide the rest.
                    Err(rusqlite::Error::FromSqlConversionFailure(column, _, e)) => {
                        tracing::warn!(column, error = %e, "skipping corrupt record row");
                    }
                    Err(e @ rusqlite::Error::InvalidColumnType(..)) => {
                        tracing::warn!(error = %e, "skipping corrupt record row");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
            tracing::debug!(count = rows.len(), "listed records");
            Ok(rows)
        })
        .await
    }

    async fn find_by_identity(&self, identity: &str) -> Result<Option<RecordRow>> {
        let identity = identity.to_string();

        self.with_conn(move |conn| {
            let sql = format!("{} WHERE identity = ?1", SELECT_RECORD);
            let row = conn
                .query_row(&sql, params![identity], row_to_record)
                .optional()?;
            Ok(row)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    async fn count_by_role(&self) -> Result<Vec<(Role, u64)>> {
        let mut counts = self
            .with_conn(|conn| count_grouped::<Role>(conn, "role"))
            .await?;
        counts.sort_by_key(|(role, _)| role.to_tag());
        Ok(counts)
    }

    async fn count_by_status(&self) -> Result<Vec<(Status, u64)>> {
        let mut counts = self
            .with_conn(|conn| count_grouped::<Status>(conn, "status"))
            .await?;
        counts.sort_by_key(|(status, _)| status.to_tag());
        Ok(counts)
    }

    async fn daily_created_since(&self, since_ms: i64) -> Result<Vec<DailyCount>> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT date(created_at / 1000, 'unixepoch') AS day, COUNT(*)
                 FROM records
                 WHERE created_at >= ?1
                 GROUP BY day
                 ORDER BY day ASC",
            )?;
            let raw = stmt
                .query_map(params![since_ms], |row| {
                    let day: String = row.get(0)?;
                    let count: i64 = row.get(1)?;
                    Ok((day, count))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            raw.into_iter()
                .map(|(day, count)| {
                    let day = NaiveDate::parse_from_str(&day, "%Y-%m-%d").map_err(|e| {
                        StoreError::InvalidData(format!("bad day bucket {:?}: {}", day, e))
                    })?;
                    Ok(DailyCount {
                        day,
                        count: count as u64,
                    })
                })
                .collect()
        })
        .await
    }
}
