// ABOUTME: HTTP surface of the gateway: auth, reverse proxy, observability.
// ABOUTME: Handlers receive shared components through axum state.

mod error;
mod observability;
mod proxy;

pub use error::ApiError;
pub use observability::{HealthResponse, StatsEntry};

use crate::lifecycle::LifecycleController;
use crate::oracle::CredentialOracle;
use crate::registry::Registry;
use crate::runtime::ContainerRuntime;
use axum::Router;
use axum::routing::get;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the tenant credential.
pub const API_KEY_HEADER: &str = "x-outline-api-key";

/// Shared components handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub controller: LifecycleController,
    pub registry: Arc<Registry>,
    pub runtime: Arc<dyn ContainerRuntime>,
    pub oracle: Arc<dyn CredentialOracle>,
    pub proxy_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        controller: LifecycleController,
        registry: Arc<Registry>,
        runtime: Arc<dyn ContainerRuntime>,
        oracle: Arc<dyn CredentialOracle>,
        request_timeout: Duration,
    ) -> Self {
        let proxy_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_default();
        Self {
            controller,
            registry,
            runtime,
            oracle,
            proxy_client,
        }
    }
}

/// Build the gateway router.
///
/// Everything that is not an observability endpoint is proxied to the
/// tenant's container, whatever the method or path.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(observability::health))
        .route("/stats", get(observability::stats))
        .fallback(proxy::forward)
        .with_state(state)
}
