// ABOUTME: Resolve error type using SNAFU with the ErrorKind pattern.
// ABOUTME: Opaque error with a kind() accessor for stable HTTP mapping.

use crate::ports::PortError;
use crate::runtime::AdapterError;
use snafu::Snafu;

/// Categories of resolution failures.
///
/// Use `ResolveError::kind()` to get this value for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResolveErrorKind {
    RuntimeUnavailable,
    NoPortsAvailable,
    ImageUnavailable,
    ProvisioningFailed,
}

/// Error from resolving a tenant to a container binding.
///
/// Opaque on purpose: callers branch on `kind()`, not on variants.
#[derive(Debug)]
pub struct ResolveError(InnerResolveError);

impl std::fmt::Display for ResolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for ResolveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl ResolveError {
    pub fn kind(&self) -> ResolveErrorKind {
        match &self.0 {
            InnerResolveError::RuntimeUnavailable { .. } => ResolveErrorKind::RuntimeUnavailable,
            InnerResolveError::NoPortsAvailable => ResolveErrorKind::NoPortsAvailable,
            InnerResolveError::ImageUnavailable { .. } => ResolveErrorKind::ImageUnavailable,
            InnerResolveError::ProvisioningFailed { .. } => ResolveErrorKind::ProvisioningFailed,
        }
    }

    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        ResolveError(InnerResolveError::RuntimeUnavailable {
            message: message.into(),
        })
    }

    pub fn no_ports_available() -> Self {
        ResolveError(InnerResolveError::NoPortsAvailable)
    }

    pub fn image_unavailable(message: impl Into<String>) -> Self {
        ResolveError(InnerResolveError::ImageUnavailable {
            message: message.into(),
        })
    }

    pub fn provisioning_failed(message: impl Into<String>) -> Self {
        ResolveError(InnerResolveError::ProvisioningFailed {
            message: message.into(),
        })
    }

    /// Classify an adapter error after the decision tree is exhausted.
    pub(crate) fn from_adapter(e: AdapterError) -> Self {
        match e {
            AdapterError::RuntimeUnavailable(message) => Self::runtime_unavailable(message),
            AdapterError::ImageUnavailable(message) => Self::image_unavailable(message),
            other => Self::provisioning_failed(other.to_string()),
        }
    }
}

impl From<PortError> for ResolveError {
    fn from(e: PortError) -> Self {
        match e {
            PortError::Exhausted { .. } => Self::no_ports_available(),
            PortError::Runtime(inner) => Self::from_adapter(inner),
        }
    }
}

/// Internal error type with full context - not exposed in the public API.
#[derive(Debug, Snafu)]
enum InnerResolveError {
    #[snafu(display("container runtime unavailable: {message}"))]
    RuntimeUnavailable { message: String },

    #[snafu(display("no free host ports in the allocation window"))]
    NoPortsAvailable,

    #[snafu(display("backend image unavailable: {message}"))]
    ImageUnavailable { message: String },

    #[snafu(display("provisioning failed: {message}"))]
    ProvisioningFailed { message: String },
}
