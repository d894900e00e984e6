// ABOUTME: Container runtime abstraction: capability trait, bollard backend,
// ABOUTME: socket detection, and the normalized adapter error taxonomy.

mod bollard;
mod detection;
mod traits;
mod types;

pub use bollard::BollardRuntime;
pub use detection::{DetectionError, detect_local, resolve_runtime};
pub use traits::{
    AdapterError, ContainerBrief, ContainerRuntime, ContainerSpec, ContainerState, InspectReport,
    PublishedPort,
};
pub use types::{RuntimeConfig, RuntimeInfo, RuntimeType};
