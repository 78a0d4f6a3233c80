//! Write-time attestation of identity strings.

use std::sync::Arc;

use crate::crypto::{IdentityDigest, RecordSignature};
use crate::error::Result;
use crate::keys::KeyPairProvider;

/// Hashes identity strings and signs the resulting digests.
///
/// The signature covers only the digest, never the rest of the record, so
/// role and status changes never require re-signing.
#[derive(Clone)]
pub struct IdentitySigner {
    keys: Arc<dyn KeyPairProvider>,
}

impl IdentitySigner {
    pub fn new(keys: Arc<dyn KeyPairProvider>) -> Self {
        Self { keys }
    }

    /// SHA-384 of the identity string's UTF-8 bytes.
    pub fn hash(identity: &str) -> IdentityDigest {
        IdentityDigest::hash(identity.as_bytes())
    }

    /// Sign a digest with the deployment key.
    pub fn sign(&self, digest: &IdentityDigest) -> Result<RecordSignature> {
        let keypair = self.keys.signing_key()?;
        Ok(keypair.sign(digest.as_ref()))
    }

    /// Hash then sign: the `(digest, signature)` pair stored with a record.
    pub fn attest(&self, identity: &str) -> Result<(IdentityDigest, RecordSignature)> {
        let digest = Self::hash(identity);
        let signature = self.sign(&digest)?;
        Ok((digest, signature))
    }

    /// The provider this signer draws keys from.
    pub fn keys(&self) -> &Arc<dyn KeyPairProvider> {
        &self.keys
    }
}

impl std::fmt::Debug for IdentitySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentitySigner").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::DIGEST_LEN;
    use crate::error::CoreError;
    use crate::keys::{StaticKeyProvider, VerifyOnlyProvider};
    use proptest::prelude::*;

    fn signer() -> IdentitySigner {
        IdentitySigner::new(Arc::new(StaticKeyProvider::from_seed(&[0x42; 32])))
    }

    #[test]
    fn test_sign_is_deterministic() {
        let signer = signer();
        let digest = IdentitySigner::hash("ops@example.com");
        assert_eq!(signer.sign(&digest).unwrap(), signer.sign(&digest).unwrap());
    }

    #[test]
    fn test_attest_matches_hash_then_sign() {
        let signer = signer();
        let (digest, signature) = signer.attest("ops@example.com").unwrap();
        assert_eq!(digest, IdentitySigner::hash("ops@example.com"));
        assert_eq!(signature, signer.sign(&digest).unwrap());
    }

    #[test]
    fn test_sign_without_private_key() {
        let key = StaticKeyProvider::from_seed(&[0x42; 32])
            .verification_key()
            .unwrap();
        let signer = IdentitySigner::new(Arc::new(VerifyOnlyProvider::new(key)));
        assert!(matches!(
            signer.attest("ops@example.com"),
            Err(CoreError::SigningKeyUnavailable(_))
        ));
    }

    proptest! {
        #[test]
        fn hash_is_deterministic_and_48_bytes(s in ".*") {
            let h1 = IdentitySigner::hash(&s);
            let h2 = IdentitySigner::hash(&s);
            prop_assert_eq!(h1, h2);
            prop_assert_eq!(h1.as_bytes().len(), DIGEST_LEN);
        }

        #[test]
        fn distinct_identities_distinct_digests(a in "[a-z]{1,12}@[a-z]{1,8}\\.com", b in "[a-z]{1,12}@[a-z]{1,8}\\.com") {
            prop_assume!(a != b);
            prop_assert_ne!(IdentitySigner::hash(&a), IdentitySigner::hash(&b));
        }
    }
}
