//! File-backed key pair persistence.
//!
//! The deployment key pair lives in a key directory as two PEM files:
//! `private.pem` (PKCS#8) and `public.pem` (SPKI). The first open of a
//! directory with neither file generates and writes a fresh pair. An existing
//! private key is never replaced. Every open after that only reads, and the
//! parsed keys are never touched again.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use warden_core::{CoreError, KeyPairProvider, Keypair, VerificationKey};

use crate::error::Result;

/// File name of the PKCS#8 private key.
pub const PRIVATE_KEY_FILE: &str = "private.pem";

/// File name of the SPKI public key.
pub const PUBLIC_KEY_FILE: &str = "public.pem";

/// A key pair loaded from (or first written to) a key directory.
pub struct FileKeyStore {
    dir: PathBuf,
    keypair: Option<Keypair>,
    verification_key: VerificationKey,
    public_pem: String,
}

impl FileKeyStore {
    /// Open the key directory, generating a key pair if neither file exists.
    ///
    /// A private key without its public half gets `public.pem` rewritten from
    /// it. Fails with [`CoreError::KeyMaterialCorrupt`] if a public key exists
    /// without a private key, if the files do not parse, or if the public key
    /// is not the public half of the private key.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let private_path = dir.join(PRIVATE_KEY_FILE);
        let public_path = dir.join(PUBLIC_KEY_FILE);

        match (private_path.exists(), public_path.exists()) {
            (false, false) => {
                fs::create_dir_all(&dir)?;
                generate(&private_path, &public_path)?;
                tracing::info!(dir = %dir.display(), "generated new signing key pair");
            }
            (true, false) => {
                let keypair = Keypair::from_pkcs8_pem(&fs::read_to_string(&private_path)?)?;
                fs::write(&public_path, keypair.verification_key().to_pem()?)?;
                tracing::info!(dir = %dir.display(), "restored missing public key");
            }
            (false, true) => {
                return Err(CoreError::KeyMaterialCorrupt(format!(
                    "{} exists without {}",
                    PUBLIC_KEY_FILE, PRIVATE_KEY_FILE
                ))
                .into());
            }
            (true, true) => {}
        }

        let private_pem = fs::read_to_string(&private_path)?;
        let keypair = Keypair::from_pkcs8_pem(&private_pem)?;

        let public_pem = fs::read_to_string(&public_path)?;
        let verification_key = parse_public(&public_pem)?;

        if keypair.verification_key() != verification_key {
            return Err(CoreError::KeyMaterialCorrupt(format!(
                "{} does not match {}",
                PUBLIC_KEY_FILE, PRIVATE_KEY_FILE
            ))
            .into());
        }

        tracing::debug!(key = ?verification_key, "loaded key pair");

        Ok(Self {
            dir,
            keypair: Some(keypair),
            verification_key,
            public_pem,
        })
    }

    /// Open only the public half. Signing through this store always fails.
    pub fn open_verify_only(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let public_pem = fs::read_to_string(dir.join(PUBLIC_KEY_FILE))?;
        let verification_key = parse_public(&public_pem)?;

        Ok(Self {
            dir,
            keypair: None,
            verification_key,
            public_pem,
        })
    }

    /// The key directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The public key exactly as stored on disk.
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }
}

impl KeyPairProvider for FileKeyStore {
    fn signing_key(&self) -> warden_core::Result<&Keypair> {
        self.keypair.as_ref().ok_or_else(|| {
            CoreError::SigningKeyUnavailable(format!(
                "key store at {} was opened verify-only",
                self.dir.display()
            ))
        })
    }

    fn verification_key(&self) -> warden_core::Result<VerificationKey> {
        Ok(self.verification_key)
    }
}

impl std::fmt::Debug for FileKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileKeyStore")
            .field("dir", &self.dir)
            .field("verification_key", &self.verification_key)
            .field("can_sign", &self.keypair.is_some())
            .finish()
    }
}

fn parse_public(pem: &str) -> Result<VerificationKey> {
    VerificationKey::from_pem(pem)
        .map_err(|e| CoreError::KeyMaterialCorrupt(format!("{}: {}", PUBLIC_KEY_FILE, e)).into())
}

fn generate(private_path: &Path, public_path: &Path) -> Result<()> {
    let keypair = Keypair::generate();
    let private_pem = keypair.to_pkcs8_pem()?;
    let public_pem = keypair.verification_key().to_pem()?;

    write_private(private_path, &private_pem)?;
    fs::write(public_path, public_pem.as_bytes())?;
    Ok(())
}

/// Create the private key file, owner-only from the moment it exists.
fn write_private(path: &Path, pem: &str) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(path)?;
    file.write_all(pem.as_bytes())?;
    file.sync_all()?;
    Ok(())
}
