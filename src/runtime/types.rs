// ABOUTME: Runtime selection types for Docker and Podman.
// ABOUTME: Detected socket info plus the optional config override.

use serde::Deserialize;

/// The container runtime flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeType {
    Docker,
    Podman,
}

impl std::fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeType::Docker => write!(f, "docker"),
            RuntimeType::Podman => write!(f, "podman"),
        }
    }
}

/// A resolved runtime endpoint.
#[derive(Debug, Clone)]
pub struct RuntimeInfo {
    pub runtime_type: RuntimeType,
    pub socket_path: String,
}

/// Optional runtime override from configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuntimeConfig {
    /// Explicit runtime type (skips auto-detection).
    pub runtime: Option<RuntimeType>,
    /// Explicit socket path (overrides the default for the runtime type).
    pub socket: Option<String>,
}
