//! Strong type definitions for Warden.
//!
//! Identifiers and tags are newtypes and enums to prevent misuse at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::{IdentityDigest, RecordSignature};
use crate::normalize::ByteRepr;

/// Storage-assigned record identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub i64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Administrative role of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Admin, Role::Manager, Role::User];

    /// Wire tag.
    pub fn to_tag(self) -> u8 {
        match self {
            Role::Admin => 0,
            Role::Manager => 1,
            Role::User => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Role::Admin),
            1 => Some(Role::Manager),
            2 => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "user" => Ok(Role::User),
            other => Err(format!(
                "invalid role {:?}, valid roles are: admin, manager, user",
                other
            )),
        }
    }
}

/// Activity status of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Active,
    Inactive,
}

impl Status {
    pub const ALL: [Status; 2] = [Status::Active, Status::Inactive];

    /// Wire tag.
    pub fn to_tag(self) -> u8 {
        match self {
            Status::Active => 0,
            Status::Inactive => 1,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Status::Active),
            1 => Some(Status::Inactive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Inactive => "inactive",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Status::Active),
            "inactive" => Ok(Status::Inactive),
            other => Err(format!(
                "invalid status {:?}, valid statuses are: active, inactive",
                other
            )),
        }
    }
}

/// A registry record with canonical binary fields.
///
/// `digest` and `signature` are opaque here: only the signer produces them
/// and only the verifier interprets them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: RecordId,
    pub identity: String,
    pub digest: IdentityDigest,
    pub role: Role,
    pub status: Status,
    /// Creation time, Unix milliseconds.
    pub created_at: i64,
    pub signature: RecordSignature,
}

/// A record as a producer hands it over for export.
///
/// Binary fields may be held in any of the representations [`ByteRepr`]
/// accepts; the encoder canonicalizes them before serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRow {
    pub id: RecordId,
    pub identity: String,
    pub digest: ByteRepr,
    pub role: Role,
    pub status: Status,
    pub created_at: i64,
    pub signature: ByteRepr,
}

impl From<&Record> for RecordRow {
    fn from(record: &Record) -> Self {
        Self {
            id: record.id,
            identity: record.identity.clone(),
            digest: ByteRepr::Raw(bytes::Bytes::copy_from_slice(record.digest.as_ref())),
            role: record.role,
            status: record.status,
            created_at: record.created_at,
            signature: ByteRepr::Raw(record.signature.0.clone()),
        }
    }
}

impl From<Record> for RecordRow {
    fn from(record: Record) -> Self {
        RecordRow::from(&record)
    }
}
