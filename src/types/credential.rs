// ABOUTME: Opaque tenant credential (an Outline API token).
// ABOUTME: Debug output shows the fingerprint, never the token itself.

use super::TenantFingerprint;
use std::fmt;

/// The upstream API token identifying a tenant.
///
/// The raw token leaves this type in exactly two places: the Bearer header
/// sent to the credential oracle, and the environment of the tenant's own
/// container.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token value.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The tenant fingerprint derived from this credential.
    pub fn fingerprint(&self) -> TenantFingerprint {
        TenantFingerprint::derive(&self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential")
            .field(&self.fingerprint().as_str())
            .finish()
    }
}
