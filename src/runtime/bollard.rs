// ABOUTME: Bollard-based container runtime adapter.
// ABOUTME: Supports Docker and Podman via the Docker-compatible API.

use super::traits::{
    AdapterError, ContainerBrief, ContainerRuntime, ContainerSpec, ContainerState, InspectReport,
    PublishedPort,
};
use super::types::{RuntimeInfo, RuntimeType};
use crate::types::{ContainerId, ImageRef};
use async_trait::async_trait;
use bollard::Docker;
use bollard::models::{
    ContainerCreateBody, HostConfig, PortBinding, RestartPolicy, RestartPolicyNameEnum,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, ListContainersOptions,
    RemoveContainerOptions, StopContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;

// =============================================================================
// Error Mapping Helpers
// =============================================================================

/// Fallback classification for bollard errors that are not handled by an
/// operation-specific mapper. Transport failures mean the daemon is gone;
/// unexpected server responses are treated as transient.
fn classify(e: bollard::errors::Error) -> AdapterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError { message, .. } => {
            AdapterError::Transient(message.clone())
        }
        _ => AdapterError::RuntimeUnavailable(e.to_string()),
    }
}

fn map_image_pull_error(e: bollard::errors::Error, image_name: &str) -> AdapterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => {
            AdapterError::ImageUnavailable(format!("{}: {}", image_name, message))
        }
        _ => classify(e),
    }
}

fn map_create_error(e: bollard::errors::Error) -> AdapterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => AdapterError::ImageUnavailable(message.clone()),
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 409 => AdapterError::Conflict(message.clone()),
        _ => classify(e),
    }
}

fn map_missing_error(e: bollard::errors::Error) -> AdapterError {
    match &e {
        bollard::errors::Error::DockerResponseServerError {
            status_code,
            message,
        } if *status_code == 404 => AdapterError::NotFound(message.clone()),
        _ => classify(e),
    }
}

fn map_state(status: bollard::models::ContainerStateStatusEnum) -> ContainerState {
    use bollard::models::ContainerStateStatusEnum as S;
    match status {
        S::CREATED => ContainerState::Created,
        S::RUNNING => ContainerState::Running,
        S::PAUSED => ContainerState::Paused,
        S::RESTARTING => ContainerState::Restarting,
        S::REMOVING => ContainerState::Removing,
        S::EXITED => ContainerState::Exited,
        S::DEAD => ContainerState::Dead,
        _ => ContainerState::Exited,
    }
}

/// Parse a binding map key like `3000/tcp` plus its host bindings into
/// published ports.
fn bindings_to_ports(
    bindings: HashMap<String, Option<Vec<PortBinding>>>,
) -> Vec<PublishedPort> {
    let mut ports = Vec::new();
    for (key, entries) in bindings {
        let Some(container_port) = key
            .split_once('/')
            .map(|(p, _)| p)
            .unwrap_or(key.as_str())
            .parse::<u16>()
            .ok()
        else {
            continue;
        };
        for binding in entries.unwrap_or_default() {
            if let Some(host_port) = binding.host_port.as_deref().and_then(|p| p.parse().ok()) {
                ports.push(PublishedPort {
                    container_port,
                    host_port,
                });
            }
        }
    }
    ports
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Container runtime adapter backed by bollard.
///
/// Works against both Docker and Podman through the Docker-compatible API.
pub struct BollardRuntime {
    client: Docker,
    runtime_type: RuntimeType,
}

impl BollardRuntime {
    pub fn new(client: Docker, runtime_type: RuntimeType) -> Self {
        Self {
            client,
            runtime_type,
        }
    }

    /// Connect to a detected runtime endpoint.
    pub fn connect(info: &RuntimeInfo) -> Result<Self, AdapterError> {
        let client =
            Docker::connect_with_unix(&info.socket_path, 120, bollard::API_DEFAULT_VERSION)
                .map_err(|e| AdapterError::RuntimeUnavailable(e.to_string()))?;
        Ok(Self::new(client, info.runtime_type))
    }

    pub fn runtime_type(&self) -> RuntimeType {
        self.runtime_type
    }
}

#[async_trait]
impl ContainerRuntime for BollardRuntime {
    async fn ping(&self) -> Result<(), AdapterError> {
        self.client
            .ping()
            .await
            .map_err(|e| AdapterError::RuntimeUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn pull_image(&self, image: &ImageRef) -> Result<(), AdapterError> {
        let image_name = image.to_string();

        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };

        // Pull returns a stream of progress updates - consume it.
        let mut stream = self.client.create_image(Some(opts), None, None);
        while let Some(result) = stream.next().await {
            result.map_err(|e| map_image_pull_error(e, &image_name))?;
        }

        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, AdapterError> {
        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let port_key = format!("{}/tcp", spec.container_port);
        let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
        port_bindings.insert(
            port_key.clone(),
            Some(vec![PortBinding {
                host_ip: None,
                host_port: Some(spec.host_port.to_string()),
            }]),
        );

        let host_config = HostConfig {
            restart_policy: Some(RestartPolicy {
                name: Some(RestartPolicyNameEnum::UNLESS_STOPPED),
                maximum_retry_count: None,
            }),
            memory: Some(spec.memory_bytes as i64),
            memory_swap: Some(spec.memory_bytes as i64),
            nano_cpus: Some((spec.cpus * 1_000_000_000.0) as i64),
            port_bindings: Some(port_bindings),
            network_mode: Some("bridge".to_string()),
            ..Default::default()
        };

        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            env: if env.is_empty() { None } else { Some(env) },
            exposed_ports: Some(vec![port_key]),
            host_config: Some(host_config),
            ..Default::default()
        };

        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        let response = self
            .client
            .create_container(Some(opts), body)
            .await
            .map_err(map_create_error)?;

        Ok(ContainerId::new(response.id))
    }

    async fn start_container(&self, name_or_id: &str) -> Result<(), AdapterError> {
        match self
            .client
            .start_container(
                name_or_id,
                None::<bollard::query_parameters::StartContainerOptions>,
            )
            .await
        {
            Ok(()) => Ok(()),
            // 304: already running, which is the state we wanted.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_missing_error(e)),
        }
    }

    async fn stop_container(&self, name_or_id: &str, timeout: Duration) -> Result<(), AdapterError> {
        let opts = StopContainerOptions {
            t: Some(timeout.as_secs() as i32),
            signal: None,
        };

        match self.client.stop_container(name_or_id, Some(opts)).await {
            Ok(()) => Ok(()),
            // 304: already stopped, which is the state we wanted.
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(map_missing_error(e)),
        }
    }

    async fn remove_container(&self, name_or_id: &str, force: bool) -> Result<(), AdapterError> {
        let opts = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.client
            .remove_container(name_or_id, Some(opts))
            .await
            .map_err(map_missing_error)?;

        Ok(())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<InspectReport, AdapterError> {
        let details = self
            .client
            .inspect_container(name_or_id, None::<InspectContainerOptions>)
            .await
            .map_err(map_missing_error)?;

        let state = details
            .state
            .as_ref()
            .and_then(|s| s.status)
            .map(map_state)
            .unwrap_or(ContainerState::Exited);

        // Read bindings from the host config: unlike the live network
        // settings, they are present for stopped containers too.
        let ports = details
            .host_config
            .and_then(|hc| hc.port_bindings)
            .map(bindings_to_ports)
            .unwrap_or_default();

        Ok(InspectReport {
            id: ContainerId::new(details.id.unwrap_or_default()),
            name: details
                .name
                .unwrap_or_default()
                .trim_start_matches('/')
                .to_string(),
            state,
            ports,
            created: details.created.map(|dt| dt.to_string()),
        })
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerBrief>, AdapterError> {
        let opts = ListContainersOptions {
            all,
            ..Default::default()
        };

        let containers = self
            .client
            .list_containers(Some(opts))
            .await
            .map_err(classify)?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default();

                let ports = c
                    .ports
                    .unwrap_or_default()
                    .into_iter()
                    .filter_map(|p| {
                        p.public_port.map(|host_port| PublishedPort {
                            container_port: p.private_port,
                            host_port,
                        })
                    })
                    .collect();

                ContainerBrief {
                    id: ContainerId::new(c.id.unwrap_or_default()),
                    name,
                    state: c
                        .state
                        .map(|s| format!("{:?}", s).to_lowercase())
                        .unwrap_or_default(),
                    ports,
                }
            })
            .collect())
    }
}
