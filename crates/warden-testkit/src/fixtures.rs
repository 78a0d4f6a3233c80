//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::sync::Arc;

use warden::{Registry, RegistryConfig};
use warden_core::{
    encode_records, IdentityDigest, Keypair, Record, RecordId, Role, StaticKeyProvider, Status,
    VerificationKey,
};
use warden_export::MemorySource;
use warden_store::MemoryStore;

/// Fixed creation time used by fixture records: 2025-01-14T16:00:00Z.
pub const FIXTURE_CREATED_AT: i64 = 1_736_870_400_000;

/// A test fixture with a deterministic or random keypair.
pub struct TestFixture {
    pub keypair: Keypair,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self {
            keypair: Keypair::generate(),
        }
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            keypair: Keypair::from_seed(&seed),
        }
    }

    /// Get the verification key.
    pub fn verification_key(&self) -> VerificationKey {
        self.keypair.verification_key()
    }

    /// The verification key as SPKI PEM.
    pub fn public_key_pem(&self) -> String {
        self.verification_key()
            .to_pem()
            .expect("Ed25519 public keys always encode")
    }

    /// A provider over this fixture's keypair.
    pub fn provider(&self) -> Arc<StaticKeyProvider> {
        Arc::new(StaticKeyProvider::new(self.keypair.clone()))
    }

    /// A registry over an empty memory store, signing with this keypair.
    pub fn registry(&self) -> Registry<MemoryStore> {
        Registry::new(self.provider(), MemoryStore::new(), RegistryConfig::default())
    }

    /// A signed user record.
    pub fn make_record(&self, id: i64, identity: &str) -> Record {
        self.make_record_with(id, identity, Role::User, Status::Active)
    }

    /// A signed record with explicit role and status.
    pub fn make_record_with(&self, id: i64, identity: &str, role: Role, status: Status) -> Record {
        let digest = IdentityDigest::hash(identity.as_bytes());
        Record {
            id: RecordId(id),
            identity: identity.to_string(),
            digest,
            role,
            status,
            created_at: FIXTURE_CREATED_AT + id,
            signature: self.keypair.sign(digest.as_ref()),
        }
    }

    /// `count` signed records with ids `1..=count`.
    pub fn make_batch(&self, count: usize) -> Vec<Record> {
        (1..=count as i64)
            .map(|i| self.make_record(i, &format!("user{}@example.com", i)))
            .collect()
    }

    /// A source serving this fixture's public key and the given records.
    pub fn source(&self, records: &[Record]) -> MemorySource {
        MemorySource::new(self.public_key_pem(), encode_records(records))
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixtures with distinct deterministic keys.
pub fn distinct_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}
