// ABOUTME: Test doubles and helpers shared across integration tests.
// ABOUTME: FakeRuntime scripts container state; StaticOracle cans validations.

#![allow(dead_code)]

use async_trait::async_trait;
use berth::lifecycle::{LifecycleController, ProvisionSettings};
use berth::oracle::{CredentialOracle, Validation};
use berth::ports::PortAllocator;
use berth::registry::Registry;
use berth::runtime::{
    AdapterError, ContainerBrief, ContainerRuntime, ContainerSpec, ContainerState, InspectReport,
    PublishedPort,
};
use berth::types::{ContainerId, Credential, ImageRef};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const BACKEND_PORT: u16 = 3000;

/// Which error an injected failure should produce.
#[derive(Debug, Clone, Copy)]
pub enum Fail {
    NotFound,
    Image,
    Runtime,
    Conflict,
    Transient,
}

impl Fail {
    fn to_error(self) -> AdapterError {
        match self {
            Fail::NotFound => AdapterError::NotFound("injected".to_string()),
            Fail::Image => AdapterError::ImageUnavailable("injected".to_string()),
            Fail::Runtime => AdapterError::RuntimeUnavailable("injected".to_string()),
            Fail::Conflict => AdapterError::Conflict("injected".to_string()),
            Fail::Transient => AdapterError::Transient("injected".to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub state: ContainerState,
    pub host_port: Option<u16>,
    pub env: HashMap<String, String>,
}

#[derive(Default)]
struct Behavior {
    create: Option<Fail>,
    start: Option<Fail>,
    stop: Option<Fail>,
    pull: Option<Fail>,
    list: Option<Fail>,
}

/// In-memory container runtime with scriptable failures and call counters.
#[derive(Default)]
pub struct FakeRuntime {
    containers: Mutex<HashMap<String, FakeContainer>>,
    behavior: Mutex<Behavior>,
    next_id: AtomicUsize,
    creates: AtomicUsize,
    starts: AtomicUsize,
    stops: AtomicUsize,
    removes: AtomicUsize,
    pulls: AtomicUsize,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a container as if it already existed on the host.
    pub fn seed(&self, name: &str, state: ContainerState, host_port: Option<u16>) {
        let id = format!("seed-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.containers.lock().insert(
            name.to_string(),
            FakeContainer {
                id,
                name: name.to_string(),
                state,
                host_port,
                env: HashMap::new(),
            },
        );
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.containers.lock().get(name).cloned()
    }

    /// Force a container into a state behind the controller's back.
    pub fn set_state(&self, name: &str, state: ContainerState) {
        if let Some(c) = self.containers.lock().get_mut(name) {
            c.state = state;
        }
    }

    /// Drop a container entirely, as if removed out of band.
    pub fn forget(&self, name: &str) {
        self.containers.lock().remove(name);
    }

    pub fn fail_create(&self, f: Option<Fail>) {
        self.behavior.lock().create = f;
    }

    pub fn fail_start(&self, f: Option<Fail>) {
        self.behavior.lock().start = f;
    }

    pub fn fail_stop(&self, f: Option<Fail>) {
        self.behavior.lock().stop = f;
    }

    pub fn fail_pull(&self, f: Option<Fail>) {
        self.behavior.lock().pull = f;
    }

    pub fn fail_list(&self, f: Option<Fail>) {
        self.behavior.lock().list = f;
    }

    pub fn create_count(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn remove_count(&self) -> usize {
        self.removes.load(Ordering::SeqCst)
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.create_count()
            + self.start_count()
            + self.stop_count()
            + self.remove_count()
            + self.pull_count()
    }

    fn find_mut<'a>(
        containers: &'a mut HashMap<String, FakeContainer>,
        name_or_id: &str,
    ) -> Option<&'a mut FakeContainer> {
        if containers.contains_key(name_or_id) {
            return containers.get_mut(name_or_id);
        }
        containers.values_mut().find(|c| c.id == name_or_id)
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn ping(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    async fn pull_image(&self, _image: &ImageRef) -> Result<(), AdapterError> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = self.behavior.lock().pull {
            return Err(f.to_error());
        }
        Ok(())
    }

    async fn create_container(&self, spec: &ContainerSpec) -> Result<ContainerId, AdapterError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = self.behavior.lock().create {
            return Err(f.to_error());
        }

        let mut containers = self.containers.lock();
        if containers.contains_key(&spec.name) {
            return Err(AdapterError::Conflict(spec.name.clone()));
        }

        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                name: spec.name.clone(),
                state: ContainerState::Created,
                host_port: Some(spec.host_port),
                env: spec.env.clone(),
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, name_or_id: &str) -> Result<(), AdapterError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = self.behavior.lock().start {
            return Err(f.to_error());
        }

        let mut containers = self.containers.lock();
        match Self::find_mut(&mut containers, name_or_id) {
            Some(c) => {
                c.state = ContainerState::Running;
                Ok(())
            }
            None => Err(AdapterError::NotFound(name_or_id.to_string())),
        }
    }

    async fn stop_container(
        &self,
        name_or_id: &str,
        _timeout: Duration,
    ) -> Result<(), AdapterError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if let Some(f) = self.behavior.lock().stop {
            return Err(f.to_error());
        }

        let mut containers = self.containers.lock();
        match Self::find_mut(&mut containers, name_or_id) {
            Some(c) => {
                c.state = ContainerState::Exited;
                Ok(())
            }
            None => Err(AdapterError::NotFound(name_or_id.to_string())),
        }
    }

    async fn remove_container(&self, name_or_id: &str, _force: bool) -> Result<(), AdapterError> {
        self.removes.fetch_add(1, Ordering::SeqCst);

        let mut containers = self.containers.lock();
        let key = match Self::find_mut(&mut containers, name_or_id) {
            Some(c) => c.name.clone(),
            None => return Err(AdapterError::NotFound(name_or_id.to_string())),
        };
        containers.remove(&key);
        Ok(())
    }

    async fn inspect_container(&self, name_or_id: &str) -> Result<InspectReport, AdapterError> {
        let mut containers = self.containers.lock();
        match Self::find_mut(&mut containers, name_or_id) {
            Some(c) => Ok(InspectReport {
                id: ContainerId::new(c.id.clone()),
                name: c.name.clone(),
                state: c.state,
                ports: c
                    .host_port
                    .map(|host_port| {
                        vec![PublishedPort {
                            container_port: BACKEND_PORT,
                            host_port,
                        }]
                    })
                    .unwrap_or_default(),
                created: None,
            }),
            None => Err(AdapterError::NotFound(name_or_id.to_string())),
        }
    }

    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerBrief>, AdapterError> {
        if let Some(f) = self.behavior.lock().list {
            return Err(f.to_error());
        }

        Ok(self
            .containers
            .lock()
            .values()
            .filter(|c| all || c.state.is_running())
            .map(|c| ContainerBrief {
                id: ContainerId::new(c.id.clone()),
                name: c.name.clone(),
                state: c.state.to_string(),
                ports: c
                    .host_port
                    .map(|host_port| {
                        vec![PublishedPort {
                            container_port: BACKEND_PORT,
                            host_port,
                        }]
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }
}

/// Oracle that always answers the same way.
pub struct StaticOracle(pub Validation);

#[async_trait]
impl CredentialOracle for StaticOracle {
    async fn validate(&self, _credential: &Credential) -> Validation {
        self.0
    }
}

/// Wire a controller over the fake runtime with a dedicated port window.
pub fn controller_with(
    runtime: &Arc<FakeRuntime>,
    low: u16,
    high: u16,
) -> (LifecycleController, Arc<Registry>, Arc<PortAllocator>) {
    let registry = Arc::new(Registry::new());
    let allocator = Arc::new(PortAllocator::new(
        runtime.clone() as Arc<dyn ContainerRuntime>,
        low,
        high,
        BACKEND_PORT,
    ));
    let controller = LifecycleController::new(
        runtime.clone() as Arc<dyn ContainerRuntime>,
        Arc::clone(&registry),
        Arc::clone(&allocator),
        ProvisionSettings {
            image: ImageRef::parse("ghcr.io/vortiago/mcp-outline:latest").unwrap(),
            memory_bytes: 256 * 1024 * 1024,
            cpus: 0.3,
            outline_url: "https://outline.test".to_string(),
        },
    );
    (controller, registry, allocator)
}

/// Hold a loopback listener open so readiness probes succeed.
///
/// The listener never accepts; the OS backlog completes the probe's
/// connection handshake on its own.
pub fn listen_on(port: u16) -> std::net::TcpListener {
    std::net::TcpListener::bind(("127.0.0.1", port)).expect("bind test listener")
}
