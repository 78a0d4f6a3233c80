//! Versioned binary encoding of record batches.
//!
//! A batch is a deterministic CBOR document (RFC 8949 core deterministic
//! encoding: definite lengths, smallest integer encodings, integer map keys
//! in ascending order):
//!
//! ```text
//! batch  = { 0: version, 1: [ record* ] }
//! record = { 0: id, 1: identity, 2: digest, 3: role, 4: status,
//!            5: created_at, 6: signature }
//! ```
//!
//! The encoder canonicalizes every binary field to raw bytes before writing.
//! The decoder is lenient about representations (timestamps as integers,
//! decimal or ISO-8601 text; binary fields as bytes, arrays or text; tags as
//! integers or names) but strict about the schema version: anything other
//! than [`SCHEMA_VERSION`] fails closed.

use std::io::Cursor;

use bytes::Bytes;
use ciborium::value::{Integer, Value};

use crate::crypto::{IdentityDigest, RecordSignature, DIGEST_LEN};
use crate::error::{CoreError, Result};
use crate::normalize::{decode_text, normalize_epoch, parse_timestamp_text};
use crate::types::{Record, RecordId, RecordRow, Role, Status};

/// Current batch schema version.
pub const SCHEMA_VERSION: u64 = 1;

/// Map keys. Keys 0-23 encode as single bytes, so numeric order is byte order.
mod keys {
    pub const VERSION: u64 = 0;
    pub const RECORDS: u64 = 1;

    pub const ID: u64 = 0;
    pub const IDENTITY: u64 = 1;
    pub const DIGEST: u64 = 2;
    pub const ROLE: u64 = 3;
    pub const STATUS: u64 = 4;
    pub const CREATED_AT: u64 = 5;
    pub const SIGNATURE: u64 = 6;
}

/// Encode producer rows into a batch.
///
/// Every row is canonicalized first; the first row that violates the schema
/// aborts the whole encode.
pub fn encode_batch(rows: &[RecordRow]) -> Result<Vec<u8>> {
    let records = rows
        .iter()
        .map(canonicalize_row)
        .collect::<Result<Vec<_>>>()?;
    Ok(encode_records(&records))
}

/// Encode already-canonical records into a batch.
pub fn encode_records(records: &[Record]) -> Vec<u8> {
    let mut w = CanonicalWriter::default();
    w.map_header(2);
    w.uint(keys::VERSION);
    w.uint(SCHEMA_VERSION);
    w.uint(keys::RECORDS);
    w.array_header(records.len());
    for record in records {
        write_record(&mut w, record);
    }
    w.into_inner()
}

/// Normalize a producer row into a canonical record.
pub fn canonicalize_row(row: &RecordRow) -> Result<Record> {
    if row.identity.trim().is_empty() {
        return Err(CoreError::EncodeValidation(format!(
            "record {}: missing identity",
            row.id
        )));
    }

    let digest_bytes = row.digest.to_bytes();
    if digest_bytes.is_empty() {
        return Err(CoreError::EncodeValidation(format!(
            "record {}: missing digest",
            row.id
        )));
    }
    let digest = IdentityDigest::try_from(&digest_bytes[..]).map_err(|_| {
        CoreError::EncodeValidation(format!(
            "record {}: digest must be {} bytes, got {}",
            row.id,
            DIGEST_LEN,
            digest_bytes.len()
        ))
    })?;

    Ok(Record {
        id: row.id,
        identity: row.identity.clone(),
        digest,
        role: row.role,
        status: row.status,
        created_at: row.created_at,
        signature: RecordSignature(row.signature.to_bytes()),
    })
}

fn write_record(w: &mut CanonicalWriter, record: &Record) {
    w.map_header(7);
    w.uint(keys::ID);
    w.int(record.id.0);
    w.uint(keys::IDENTITY);
    w.text(&record.identity);
    w.uint(keys::DIGEST);
    w.bytes(record.digest.as_ref());
    w.uint(keys::ROLE);
    w.uint(record.role.to_tag().into());
    w.uint(keys::STATUS);
    w.uint(record.status.to_tag().into());
    w.uint(keys::CREATED_AT);
    w.int(record.created_at);
    w.uint(keys::SIGNATURE);
    w.bytes(record.signature.as_bytes());
}

/// Minimal deterministic CBOR writer.
#[derive(Default)]
struct CanonicalWriter {
    buf: Vec<u8>,
}

impl CanonicalWriter {
    fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    /// Write a head with the given major type using the smallest encoding.
    fn head(&mut self, major: u8, n: u64) {
        let mt = major << 5;
        if n < 24 {
            self.buf.push(mt | (n as u8));
        } else if n <= 0xff {
            self.buf.push(mt | 24);
            self.buf.push(n as u8);
        } else if n <= 0xffff {
            self.buf.push(mt | 25);
            self.buf.extend_from_slice(&(n as u16).to_be_bytes());
        } else if n <= 0xffff_ffff {
            self.buf.push(mt | 26);
            self.buf.extend_from_slice(&(n as u32).to_be_bytes());
        } else {
            self.buf.push(mt | 27);
            self.buf.extend_from_slice(&n.to_be_bytes());
        }
    }

    fn uint(&mut self, n: u64) {
        self.head(0, n);
    }

    fn int(&mut self, n: i64) {
        if n >= 0 {
            self.head(0, n as u64);
        } else {
            // CBOR encodes -1 as 0, -2 as 1, etc.
            self.head(1, !(n as u64));
        }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.head(2, bytes.len() as u64);
        self.buf.extend_from_slice(bytes);
    }

    fn text(&mut self, s: &str) {
        self.head(3, s.len() as u64);
        self.buf.extend_from_slice(s.as_bytes());
    }

    fn array_header(&mut self, len: usize) {
        self.head(4, len as u64);
    }

    fn map_header(&mut self, len: usize) {
        self.head(5, len as u64);
    }
}

/// One entry of a decoded batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEntry {
    Record(Record),
    /// The entry did not have the shape of a record.
    Malformed(MalformedRecord),
}

/// A batch entry that could not be read as a [`Record`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    /// Position in the batch.
    pub index: usize,
    /// The record id, if it could be read.
    pub id: Option<RecordId>,
    /// The digest bytes as carried. `None` if they could not be read at all;
    /// a missing digest is empty.
    pub digest: Option<Bytes>,
    pub reason: String,
}

/// Decode a batch back into records.
///
/// Strict: the first malformed record fails the whole decode. Consumers that
/// must keep the well-formed siblings of a bad record use [`decode_entries`].
pub fn decode_batch(bytes: &[u8]) -> Result<Vec<Record>> {
    decode_entries(bytes)?
        .into_iter()
        .map(|entry| match entry {
            BatchEntry::Record(record) => Ok(record),
            BatchEntry::Malformed(bad) => Err(CoreError::Decode(format!(
                "record {}: {}",
                bad.index, bad.reason
            ))),
        })
        .collect()
}

/// Decode a batch into per-record entries.
///
/// Envelope errors (corrupt or truncated bytes, trailing garbage, a
/// non-map batch, a wrong schema version) still fail the whole decode.
/// A record that is malformed on its own becomes [`BatchEntry::Malformed`].
pub fn decode_entries(bytes: &[u8]) -> Result<Vec<BatchEntry>> {
    let mut cursor = Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(&mut cursor).map_err(|e| CoreError::Decode(e.to_string()))?;

    if cursor.position() as usize != bytes.len() {
        return Err(CoreError::Decode(format!(
            "{} trailing bytes after batch",
            bytes.len() - cursor.position() as usize
        )));
    }

    let map = match &value {
        Value::Map(m) => m,
        _ => return Err(CoreError::Decode("batch is not a map".into())),
    };

    let found = match lookup(map, keys::VERSION) {
        Some(Value::Integer(i)) => u64::try_from(i128::from(*i)).ok(),
        _ => None,
    };
    if found != Some(SCHEMA_VERSION) {
        return Err(CoreError::SchemaMismatch {
            expected: SCHEMA_VERSION,
            found,
        });
    }

    match lookup(map, keys::RECORDS) {
        Some(Value::Array(items)) => Ok(items
            .iter()
            .enumerate()
            .map(|(index, item)| decode_entry(item, index))
            .collect()),
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(CoreError::Decode("records is not an array".into())),
    }
}

/// Find a value by integer key.
fn lookup(map: &[(Value, Value)], key: u64) -> Option<&Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
        .map(|(_, v)| v)
}

fn decode_entry(value: &Value, index: usize) -> BatchEntry {
    let map = match value {
        Value::Map(m) => m,
        _ => {
            tracing::debug!(index, "batch entry is not a map");
            return BatchEntry::Malformed(MalformedRecord {
                index,
                id: None,
                digest: None,
                reason: "not a map".into(),
            });
        }
    };

    match record_from_map(map) {
        Ok(record) => BatchEntry::Record(record),
        Err(reason) => {
            tracing::debug!(index, %reason, "malformed batch entry");
            let id = match lookup(map, keys::ID) {
                Some(Value::Integer(i)) => integer_to_i64(*i).map(RecordId),
                _ => None,
            };
            let digest = match lookup(map, keys::DIGEST) {
                None => Some(Bytes::new()),
                Some(v) => value_to_bytes(v).ok(),
            };
            BatchEntry::Malformed(MalformedRecord {
                index,
                id,
                digest,
                reason,
            })
        }
    }
}

fn record_from_map(map: &[(Value, Value)]) -> std::result::Result<Record, String> {
    let id = match lookup(map, keys::ID) {
        Some(Value::Integer(i)) => integer_to_i64(*i).ok_or("id out of range")?,
        _ => return Err("missing id".into()),
    };

    let identity = match lookup(map, keys::IDENTITY) {
        Some(Value::Text(s)) => s.clone(),
        _ => return Err("missing identity".into()),
    };

    let digest_bytes = lookup(map, keys::DIGEST)
        .map(value_to_bytes)
        .transpose()
        .map_err(|e| format!("digest: {}", e))?
        .unwrap_or_default();
    let digest = IdentityDigest::try_from(&digest_bytes[..]).map_err(|_| {
        format!(
            "digest must be {} bytes, got {}",
            DIGEST_LEN,
            digest_bytes.len()
        )
    })?;

    let role = match lookup(map, keys::ROLE) {
        Some(Value::Integer(i)) => integer_to_i64(*i)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Role::from_tag)
            .ok_or("unknown role tag")?,
        Some(Value::Text(s)) => s.parse::<Role>()?,
        _ => return Err("missing role".into()),
    };

    let status = match lookup(map, keys::STATUS) {
        Some(Value::Integer(i)) => integer_to_i64(*i)
            .and_then(|n| u8::try_from(n).ok())
            .and_then(Status::from_tag)
            .ok_or("unknown status tag")?,
        Some(Value::Text(s)) => s.parse::<Status>()?,
        _ => return Err("missing status".into()),
    };

    let raw_created = match lookup(map, keys::CREATED_AT) {
        Some(Value::Integer(i)) => integer_to_i64(*i),
        Some(Value::Text(s)) => parse_timestamp_text(s),
        Some(Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
        _ => None,
    }
    .ok_or("missing or unparseable created_at")?;

    let signature = lookup(map, keys::SIGNATURE)
        .map(value_to_bytes)
        .transpose()
        .map_err(|e| format!("signature: {}", e))?
        .unwrap_or_default();

    Ok(Record {
        id: RecordId(id),
        identity,
        digest,
        role,
        status,
        created_at: normalize_epoch(raw_created),
        signature: RecordSignature(signature),
    })
}

fn integer_to_i64(i: Integer) -> Option<i64> {
    i64::try_from(i128::from(i)).ok()
}

/// Map any tolerated binary representation onto raw bytes.
fn value_to_bytes(value: &Value) -> std::result::Result<Bytes, String> {
    match value {
        Value::Bytes(b) => Ok(Bytes::copy_from_slice(b)),
        Value::Text(s) => Ok(Bytes::from(decode_text(s))),
        Value::Null => Ok(Bytes::new()),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Integer(i) => u8::try_from(i128::from(*i))
                    .map_err(|_| "array element is not a byte".to_string()),
                _ => Err("array element is not an integer".to_string()),
            })
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map(Bytes::from),
        _ => Err("unsupported representation".to_string()),
    }
}
