// ABOUTME: Tenant fingerprint derivation and deterministic container naming.
// ABOUTME: A fingerprint is the first 12 lowercase hex chars of SHA-256(credential).

use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

/// Prefix for all container names managed by this gateway.
pub const CONTAINER_NAME_PREFIX: &str = "mcp-";

const FINGERPRINT_LEN: usize = 12;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("fingerprint must be exactly 12 characters, got {0}")]
    WrongLength(usize),

    #[error("invalid character in fingerprint: '{0}'")]
    InvalidChar(char),
}

/// Stable identifier for a tenant, used as registry key and container name
/// suffix. Because the derivation is a pure function of the credential, a
/// lost registry can be rebuilt from the runtime's container inventory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantFingerprint(String);

impl TenantFingerprint {
    /// Derive the fingerprint for a tenant secret.
    pub fn derive(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut hex = String::with_capacity(FINGERPRINT_LEN);
        for byte in &digest[..FINGERPRINT_LEN / 2] {
            hex.push_str(&format!("{:02x}", byte));
        }
        Self(hex)
    }

    /// Validate a fingerprint received from outside (e.g. recovered from a
    /// container name).
    pub fn parse(value: &str) -> Result<Self, FingerprintError> {
        if value.len() != FINGERPRINT_LEN {
            return Err(FingerprintError::WrongLength(value.len()));
        }
        for c in value.chars() {
            if !c.is_ascii_digit() && !('a'..='f').contains(&c) {
                return Err(FingerprintError::InvalidChar(c));
            }
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name of the container serving this tenant.
    pub fn container_name(&self) -> String {
        format!("{}{}", CONTAINER_NAME_PREFIX, self.0)
    }
}

impl fmt::Display for TenantFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
