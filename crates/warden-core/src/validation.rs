//! Identity string validation.

use crate::error::{CoreError, Result};

/// Maximum identity length (RFC 5321 path limit).
pub const MAX_IDENTITY_LEN: usize = 254;

/// Validate the shape of an identity string.
///
/// This performs:
/// - Emptiness and length checks
/// - Whitespace and control character rejection
/// - A single `@` separating non-empty local and domain parts
/// - A dotted domain without empty labels
pub fn validate_identity(identity: &str) -> Result<()> {
    if identity.is_empty() {
        return Err(CoreError::InvalidIdentity("identity is empty".into()));
    }
    if identity.len() > MAX_IDENTITY_LEN {
        return Err(CoreError::InvalidIdentity(format!(
            "identity exceeds {} bytes",
            MAX_IDENTITY_LEN
        )));
    }
    if identity.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::InvalidIdentity(
            "identity contains whitespace or control characters".into(),
        ));
    }

    let (local, domain) = identity
        .split_once('@')
        .ok_or_else(|| CoreError::InvalidIdentity("identity must contain '@'".into()))?;

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(CoreError::InvalidIdentity(
            "identity must be of the form local@domain".into(),
        ));
    }
    if !domain.contains('.') || domain.split('.').any(str::is_empty) {
        return Err(CoreError::InvalidIdentity(format!(
            "invalid domain {:?}",
            domain
        )));
    }

    Ok(())
}
