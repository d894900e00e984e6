// ABOUTME: Lifecycle controller mapping tenants to ready containers.
// ABOUTME: Single-flight per fingerprint across resolve, idle sweep, and eviction.

mod error;

pub use error::{ResolveError, ResolveErrorKind};

use crate::config::BACKEND_CONTAINER_PORT;
use crate::ports::PortAllocator;
use crate::registry::{ContainerRecord, ContainerStatus, Registry};
use crate::runtime::{AdapterError, ContainerRuntime, ContainerSpec, InspectReport};
use crate::types::{Credential, ImageRef, TenantFingerprint};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// How long a freshly created container gets to open its port.
const CREATE_READY_BUDGET: Duration = Duration::from_secs(5);
/// How long a restarted container gets to open its port.
const RESTART_READY_BUDGET: Duration = Duration::from_secs(2);
/// How long to wait out a container observed mid-start.
const STARTING_WAIT_BUDGET: Duration = Duration::from_secs(5);
/// Probe cadence while waiting for readiness.
const READY_POLL: Duration = Duration::from_millis(250);
/// Graceful stop allowance for idle and evicted containers.
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// A resolved tenant binding: where this tenant's traffic goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub host_port: u16,
    pub container_name: String,
}

/// Settings the controller needs to provision containers.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub image: ImageRef,
    pub memory_bytes: u64,
    pub cpus: f64,
    pub outline_url: String,
}

/// The decision engine for tenant containers.
///
/// All lifecycle operations for one fingerprint (resolve, idle stop,
/// eviction) are serialized by a per-fingerprint mutex; operations on
/// different fingerprints proceed concurrently. Cheap to clone.
#[derive(Clone)]
pub struct LifecycleController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<Registry>,
    allocator: Arc<PortAllocator>,
    settings: ProvisionSettings,
    locks: Mutex<HashMap<TenantFingerprint, Arc<tokio::sync::Mutex<()>>>>,
}

impl LifecycleController {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<Registry>,
        allocator: Arc<PortAllocator>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                runtime,
                registry,
                allocator,
                settings,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve a credential to a ready container binding, provisioning,
    /// restarting, or adopting as needed.
    ///
    /// Callers sharing a fingerprint collapse into one in-flight pass: they
    /// serialize on the tenant lock, the first one materializes the
    /// container, and the rest land on the fast path. The pass itself runs
    /// on a detached task, so a caller that disconnects mid-provisioning
    /// cannot abort work other callers are waiting on.
    pub async fn resolve(&self, credential: &Credential) -> Result<Binding, ResolveError> {
        let fingerprint = credential.fingerprint();
        let guard = self.inner.tenant_lock(&fingerprint).lock_owned().await;

        let inner = Arc::clone(&self.inner);
        let credential = credential.clone();
        let task = tokio::spawn(async move {
            let result = inner.resolve_locked(&credential, &fingerprint).await;
            drop(guard);
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) => Err(ResolveError::provisioning_failed(format!(
                "resolve task failed: {}",
                e
            ))),
        }
    }

    /// Stop containers idle past `threshold`. Returns how many were stopped.
    pub async fn stop_idle(&self, threshold: Duration) -> usize {
        self.inner.stop_idle(threshold).await
    }

    /// Remove a tenant's container and forget it entirely, releasing its
    /// port lease. Exposed for operational tooling; nothing on the request
    /// path calls it.
    pub async fn evict(&self, fingerprint: &TenantFingerprint) -> Result<(), ResolveError> {
        self.inner.evict(fingerprint).await
    }
}

impl ControllerInner {
    fn tenant_lock(&self, fingerprint: &TenantFingerprint) -> Arc<tokio::sync::Mutex<()>> {
        self.locks
            .lock()
            .entry(fingerprint.clone())
            .or_default()
            .clone()
    }

    async fn stop_idle(&self, threshold: Duration) -> usize {
        let threshold = chrono::Duration::from_std(threshold).unwrap_or(chrono::Duration::MAX);
        let mut stopped = 0;

        for record in self.registry.snapshot() {
            if record.status != ContainerStatus::Running
                || record.idle_since(Utc::now()) <= threshold
            {
                continue;
            }

            let lock = self.tenant_lock(&record.fingerprint);
            let _guard = lock.lock().await;

            // Re-check under the lock: a request may have landed meanwhile.
            let Some(current) = self.registry.get(&record.fingerprint) else {
                continue;
            };
            if current.status != ContainerStatus::Running
                || current.idle_since(Utc::now()) <= threshold
            {
                continue;
            }

            match self
                .runtime
                .stop_container(&current.name, STOP_TIMEOUT)
                .await
            {
                Ok(()) => {
                    self.registry
                        .update(&record.fingerprint, |r| r.status = ContainerStatus::Stopped);
                    info!(
                        fingerprint = %record.fingerprint,
                        idle_secs = current.idle_since(Utc::now()).num_seconds(),
                        "stopped idle container"
                    );
                    stopped += 1;
                }
                Err(e) => {
                    // Record stays Running; the next sweep retries.
                    warn!(
                        fingerprint = %record.fingerprint,
                        error = %e,
                        "failed to stop idle container"
                    );
                }
            }
        }

        stopped
    }

    async fn evict(&self, fingerprint: &TenantFingerprint) -> Result<(), ResolveError> {
        let lock = self.tenant_lock(fingerprint);
        let _guard = lock.lock().await;

        let Some(record) = self.registry.get(fingerprint) else {
            return Ok(());
        };

        match self.runtime.remove_container(&record.name, true).await {
            Ok(()) | Err(AdapterError::NotFound(_)) => {}
            Err(e) => return Err(ResolveError::from_adapter(e)),
        }

        self.registry.delete(fingerprint);
        self.allocator.release(record.host_port).await;
        info!(%fingerprint, "evicted tenant container");
        Ok(())
    }

    /// The decision tree. Runs with the tenant lock held.
    async fn resolve_locked(
        &self,
        credential: &Credential,
        fingerprint: &TenantFingerprint,
    ) -> Result<Binding, ResolveError> {
        let name = fingerprint.container_name();

        // Step 1 and 2: the registry remembers this tenant.
        if let Some(record) = self.registry.get(fingerprint) {
            match self.runtime.inspect_container(&name).await {
                Ok(report) if report.state.is_running() => {
                    self.registry.touch(fingerprint, Utc::now());
                    debug!(%fingerprint, port = record.host_port, "fast path: container running");
                    return Ok(Binding {
                        host_port: record.host_port,
                        container_name: name,
                    });
                }
                Ok(_) | Err(AdapterError::NotFound(_)) => {
                    match self.restart_known(fingerprint, &record).await {
                        Ok(binding) => return Ok(binding),
                        Err(e) => {
                            // Beyond a plain restart: forget the record and
                            // fall through to rediscovery.
                            warn!(%fingerprint, error = %e, "restart failed, rebuilding");
                            self.registry.delete(fingerprint);
                            self.allocator.release(record.host_port).await;
                        }
                    }
                }
                Err(e) => return Err(ResolveError::from_adapter(e)),
            }
        }

        // Step 3: adopt whatever the runtime already holds for this tenant,
        // e.g. after a gateway restart wiped the registry.
        match self.runtime.inspect_container(&name).await {
            Ok(report) => {
                if let Some(binding) = self.adopt_existing(fingerprint, &report).await? {
                    return Ok(binding);
                }
                // The existing container was unusable and has been removed.
            }
            Err(AdapterError::NotFound(_)) => {}
            Err(e) => return Err(ResolveError::from_adapter(e)),
        }

        // Step 4: fresh creation.
        self.provision_fresh(credential, fingerprint).await
    }

    /// Step 2: restart the container the registry remembers.
    async fn restart_known(
        &self,
        fingerprint: &TenantFingerprint,
        record: &ContainerRecord,
    ) -> Result<Binding, ResolveError> {
        info!(%fingerprint, port = record.host_port, "restarting stopped container");
        self.runtime
            .start_container(&record.name)
            .await
            .map_err(ResolveError::from_adapter)?;

        // Restart resets the idle clock.
        self.registry.update(fingerprint, |r| {
            r.status = ContainerStatus::Running;
            r.last_used_at = Utc::now();
        });

        if !wait_until_ready(record.host_port, RESTART_READY_BUDGET).await {
            return Err(ResolveError::provisioning_failed(format!(
                "container {} did not accept connections on port {}",
                record.name, record.host_port
            )));
        }

        Ok(Binding {
            host_port: record.host_port,
            container_name: record.name.clone(),
        })
    }

    /// Step 3: rebuild a record from a container found in runtime inventory.
    ///
    /// Returns `Ok(None)` when the container was unusable and removed, in
    /// which case fresh creation should proceed.
    async fn adopt_existing(
        &self,
        fingerprint: &TenantFingerprint,
        report: &InspectReport,
    ) -> Result<Option<Binding>, ResolveError> {
        let name = fingerprint.container_name();

        let Some(host_port) = report.host_port_for(BACKEND_CONTAINER_PORT) else {
            // Without a usable binding the container cannot serve traffic,
            // and its name blocks re-creation.
            warn!(%fingerprint, state = %report.state, "removing container without usable port binding");
            self.runtime
                .remove_container(&name, true)
                .await
                .map_err(ResolveError::from_adapter)?;
            return Ok(None);
        };

        // Claim the port before any start so a parallel provisioning for a
        // different tenant cannot lease it.
        self.allocator.adopt(host_port).await;

        if report.state.is_starting() {
            self.await_running(&name).await?;
            info!(%fingerprint, port = host_port, "adopted starting container");
        } else if !report.state.is_running() {
            info!(%fingerprint, port = host_port, "restarting adopted container");
            self.runtime
                .start_container(&name)
                .await
                .map_err(ResolveError::from_adapter)?;
            if !wait_until_ready(host_port, RESTART_READY_BUDGET).await {
                return Err(ResolveError::provisioning_failed(format!(
                    "container {} did not accept connections on port {}",
                    name, host_port
                )));
            }
        } else {
            info!(%fingerprint, port = host_port, "adopted running container");
        }

        self.registry
            .put(ContainerRecord::new(fingerprint.clone(), host_port, Utc::now()));

        Ok(Some(Binding {
            host_port,
            container_name: name,
        }))
    }

    /// Step 4: create and start a brand new container.
    async fn provision_fresh(
        &self,
        credential: &Credential,
        fingerprint: &TenantFingerprint,
    ) -> Result<Binding, ResolveError> {
        let name = fingerprint.container_name();
        let host_port = self.allocator.acquire().await?;

        // Best effort: a failed pull is tolerated when a local image can
        // still satisfy the create.
        if let Err(e) = self.runtime.pull_image(&self.settings.image).await {
            warn!(image = %self.settings.image, error = %e, "image pull failed, trying local image");
        }

        let spec = self.container_spec(credential, &name, host_port);
        info!(%fingerprint, port = host_port, image = %self.settings.image, "creating container");

        let id = match self.runtime.create_container(&spec).await {
            Ok(id) => id,
            Err(e) => {
                self.allocator.release(host_port).await;
                return Err(ResolveError::from_adapter(e));
            }
        };

        if let Err(e) = self.runtime.start_container(id.as_str()).await {
            // The created husk would block the next attempt by name.
            let _ = self.runtime.remove_container(id.as_str(), true).await;
            self.allocator.release(host_port).await;
            return Err(ResolveError::from_adapter(e));
        }

        // Record before probing: even when the backend is slow to open its
        // port, the container stays in place and the sweeper sees fresh use.
        self.registry
            .put(ContainerRecord::new(fingerprint.clone(), host_port, Utc::now()));

        if !wait_until_ready(host_port, CREATE_READY_BUDGET).await {
            return Err(ResolveError::provisioning_failed(format!(
                "container {} did not accept connections on port {}",
                name, host_port
            )));
        }

        info!(%fingerprint, port = host_port, "container ready");
        Ok(Binding {
            host_port,
            container_name: name,
        })
    }

    /// Poll a container observed mid-start until it reports running.
    async fn await_running(&self, name: &str) -> Result<InspectReport, ResolveError> {
        let deadline = Instant::now() + STARTING_WAIT_BUDGET;
        loop {
            let report = self
                .runtime
                .inspect_container(name)
                .await
                .map_err(ResolveError::from_adapter)?;
            if report.state.is_running() {
                return Ok(report);
            }
            if Instant::now() >= deadline {
                return Err(ResolveError::provisioning_failed(format!(
                    "container {} stuck in {} state",
                    name, report.state
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    fn container_spec(
        &self,
        credential: &Credential,
        name: &str,
        host_port: u16,
    ) -> ContainerSpec {
        let mut env = HashMap::new();
        env.insert(
            "OUTLINE_API_KEY".to_string(),
            credential.expose().to_string(),
        );
        env.insert(
            "OUTLINE_API_URL".to_string(),
            self.settings.outline_url.clone(),
        );
        env.insert("MCP_TRANSPORT".to_string(), "streamable-http".to_string());
        env.insert("MCP_HOST".to_string(), "0.0.0.0".to_string());
        env.insert("MCP_PORT".to_string(), BACKEND_CONTAINER_PORT.to_string());

        ContainerSpec {
            name: name.to_string(),
            image: self.settings.image.clone(),
            env,
            host_port,
            container_port: BACKEND_CONTAINER_PORT,
            memory_bytes: self.settings.memory_bytes,
            cpus: self.settings.cpus,
        }
    }
}

/// Probe a published port until it accepts a TCP connection.
///
/// The observable contract of resolve is that the returned port accepts
/// connections; a dial probe gets there faster than a fixed sleep.
async fn wait_until_ready(port: u16, budget: Duration) -> bool {
    let deadline = Instant::now() + budget;
    loop {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(READY_POLL).await;
    }
}
