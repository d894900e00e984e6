// ABOUTME: Capability trait for container runtimes plus shared spec/report types.
// ABOUTME: Everything above this boundary is runtime-agnostic and mockable.

use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Runtime operation errors, normalized from SDK specifics.
///
/// The adapter maps container-runtime errors into this taxonomy; layers
/// above never see the SDK's own error types.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("image unavailable: {0}")]
    ImageUnavailable(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transient runtime failure: {0}")]
    Transient(String),
}

/// Desired configuration for a tenant container.
#[derive(Debug, Clone)]
pub struct ContainerSpec {
    /// Container name, derived from the tenant fingerprint.
    pub name: String,
    /// Image to run.
    pub image: ImageRef,
    /// Environment variables, including the tenant credential.
    pub env: HashMap<String, String>,
    /// Host port published for `container_port`.
    pub host_port: u16,
    /// Port the backend listens on inside the container.
    pub container_port: u16,
    /// Memory cap in bytes, applied to both memory and memory+swap.
    pub memory_bytes: u64,
    /// CPU allowance in whole-core units.
    pub cpus: f64,
}

/// Container state as reported by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
}

impl ContainerState {
    pub fn is_running(self) -> bool {
        matches!(self, ContainerState::Running)
    }

    /// The runtime accepted the container but has not finished bringing it up.
    pub fn is_starting(self) -> bool {
        matches!(self, ContainerState::Created | ContainerState::Restarting)
    }
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
        };
        write!(f, "{}", s)
    }
}

/// One host-port publication of a container port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedPort {
    pub container_port: u16,
    pub host_port: u16,
}

/// Snapshot of a single container from inspect.
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub id: ContainerId,
    pub name: String,
    pub state: ContainerState,
    pub ports: Vec<PublishedPort>,
    /// Creation timestamp as reported by the runtime, verbatim.
    pub created: Option<String>,
}

impl InspectReport {
    /// The host port published for the given container port, if any.
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
    }
}

/// Summary entry from a container listing.
#[derive(Debug, Clone)]
pub struct ContainerBrief {
    pub id: ContainerId,
    pub name: String,
    pub state: String,
    pub ports: Vec<PublishedPort>,
}

impl ContainerBrief {
    pub fn host_port_for(&self, container_port: u16) -> Option<u16> {
        self.ports
            .iter()
            .find(|p| p.container_port == container_port)
            .map(|p| p.host_port)
    }
}

/// Container runtime operations used by the gateway.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Check connectivity to the runtime daemon.
    async fn ping(&self) -> Result<(), AdapterError>;

    /// Pull an image from its registry.
    async fn pull_image(&self, image: &ImageRef) -> Result<(), AdapterError>;

    /// Create a container from the given spec.
    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, AdapterError>;

    /// Start a created or stopped container.
    async fn start_container(&self, name_or_id: &str) -> Result<(), AdapterError>;

    /// Stop a running container, allowing `timeout` for graceful shutdown.
    async fn stop_container(&self, name_or_id: &str, timeout: Duration) -> Result<(), AdapterError>;

    /// Remove a container.
    async fn remove_container(&self, name_or_id: &str, force: bool) -> Result<(), AdapterError>;

    /// Get detailed information about a container.
    async fn inspect_container(&self, name_or_id: &str) -> Result<InspectReport, AdapterError>;

    /// List containers; `all` includes stopped ones.
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerBrief>, AdapterError>;
}
