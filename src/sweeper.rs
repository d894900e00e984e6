// ABOUTME: Periodic idle sweep stopping containers unused past the threshold.
// ABOUTME: Best-effort: failures are logged and retried on the next tick.

use crate::lifecycle::LifecycleController;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::debug;

/// Background task enforcing the idle-timeout policy.
///
/// Stopped containers keep their port lease; the next resolve restarts the
/// same container on the same port.
pub struct IdleSweeper {
    controller: LifecycleController,
    interval: Duration,
    idle_threshold: Duration,
}

impl IdleSweeper {
    pub fn new(
        controller: LifecycleController,
        interval: Duration,
        idle_threshold: Duration,
    ) -> Self {
        Self {
            controller,
            interval,
            idle_threshold,
        }
    }

    /// Run the sweep loop forever. Spawn this on its own task.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing can be idle yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let stopped = self.controller.stop_idle(self.idle_threshold).await;
            if stopped > 0 {
                debug!(stopped, "idle sweep finished");
            }
        }
    }
}
