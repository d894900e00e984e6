// ABOUTME: Host port allocation from a bounded window with a rolling cursor.
// ABOUTME: Reconciles against runtime inventory so rediscovered ports are skipped.

use crate::runtime::{AdapterError, ContainerRuntime};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("no free host ports in window {low}..{high}")]
    Exhausted { low: u16, high: u16 },

    #[error(transparent)]
    Runtime(#[from] AdapterError),
}

struct AllocatorState {
    leased: BTreeSet<u16>,
    next: u16,
}

/// Hands out host ports from `[low, high)`.
///
/// Acquisition reconciles first: ports already bound by containers the
/// runtime knows about (in any state) are treated as in use even when this
/// process never leased them. Leases survive idle stops; they are released
/// only once container removal is confirmed.
pub struct PortAllocator {
    runtime: Arc<dyn ContainerRuntime>,
    low: u16,
    high: u16,
    container_port: u16,
    state: Mutex<AllocatorState>,
}

impl PortAllocator {
    /// `container_port` is the in-container port whose host bindings count
    /// as in-use during reconciliation.
    pub fn new(runtime: Arc<dyn ContainerRuntime>, low: u16, high: u16, container_port: u16) -> Self {
        Self {
            runtime,
            low,
            high,
            container_port,
            state: Mutex::new(AllocatorState {
                leased: BTreeSet::new(),
                next: low,
            }),
        }
    }

    /// Lease the first free port at or after the cursor, wrapping once.
    pub async fn acquire(&self) -> Result<u16, PortError> {
        let mut state = self.state.lock().await;

        let in_use = self.bound_ports().await?;

        let free = (state.next..self.high)
            .chain(self.low..state.next)
            .find(|p| !state.leased.contains(p) && !in_use.contains(p));

        match free {
            Some(port) => {
                state.leased.insert(port);
                state.next = if port + 1 >= self.high { self.low } else { port + 1 };
                debug!(port, "leased host port");
                Ok(port)
            }
            None => Err(PortError::Exhausted {
                low: self.low,
                high: self.high,
            }),
        }
    }

    /// Return a lease to the pool.
    pub async fn release(&self, port: u16) {
        let mut state = self.state.lock().await;
        if state.leased.remove(&port) {
            debug!(port, "released host port");
        }
    }

    /// Record a port discovered from runtime inventory so later acquisitions
    /// avoid it.
    pub async fn adopt(&self, port: u16) {
        let mut state = self.state.lock().await;
        if state.leased.insert(port) {
            debug!(port, "adopted existing host port");
        }
    }

    /// Host ports currently bound by any container on the internal port.
    async fn bound_ports(&self) -> Result<BTreeSet<u16>, AdapterError> {
        let briefs = self.runtime.list_containers(true).await?;
        Ok(briefs
            .iter()
            .filter_map(|b| b.host_port_for(self.container_port))
            .collect())
    }
}
