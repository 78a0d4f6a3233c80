//! Key pair providers.
//!
//! A deployment has exactly one key pair. It is constructed once at process
//! start and handed to the signer and verifier as shared, read-only state.

use crate::crypto::{Keypair, VerificationKey};
use crate::error::{CoreError, Result};

/// Source of the deployment key pair.
///
/// Implementations never mutate key material after construction.
pub trait KeyPairProvider: Send + Sync {
    /// The private signing key.
    fn signing_key(&self) -> Result<&Keypair>;

    /// The public verification key.
    fn verification_key(&self) -> Result<VerificationKey>;
}

/// A provider over a key pair already held in memory.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    keypair: Keypair,
}

impl StaticKeyProvider {
    pub fn new(keypair: Keypair) -> Self {
        Self { keypair }
    }

    /// Deterministic provider from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(Keypair::from_seed(seed))
    }
}

impl KeyPairProvider for StaticKeyProvider {
    fn signing_key(&self) -> Result<&Keypair> {
        Ok(&self.keypair)
    }

    fn verification_key(&self) -> Result<VerificationKey> {
        Ok(self.keypair.verification_key())
    }
}

/// A provider holding only the public half.
///
/// Consumers use this; any attempt to sign fails.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOnlyProvider {
    key: VerificationKey,
}

impl VerifyOnlyProvider {
    pub fn new(key: VerificationKey) -> Self {
        Self { key }
    }
}

impl KeyPairProvider for VerifyOnlyProvider {
    fn signing_key(&self) -> Result<&Keypair> {
        Err(CoreError::SigningKeyUnavailable(
            "provider holds only a verification key".into(),
        ))
    }

    fn verification_key(&self) -> Result<VerificationKey> {
        Ok(self.key)
    }
}
