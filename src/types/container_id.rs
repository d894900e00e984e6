// ABOUTME: Identifier assigned by the container runtime at creation time.
// ABOUTME: Distinct from the deterministic container name derived from the tenant.

use std::fmt;

/// A runtime-assigned container identifier.
#[must_use = "container ids reference live resources and should not be ignored"]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerId(String);

impl ContainerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
