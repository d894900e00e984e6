// ABOUTME: Health and per-tenant stats endpoints.
// ABOUTME: Read-only views over the registry; neither triggers provisioning.

use super::AppState;
use crate::registry::ContainerStatus;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub containers_tracked: usize,
    pub containers_running: usize,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        containers_tracked: state.registry.tracked(),
        containers_running: state.registry.running(),
    })
}

#[derive(Debug, Serialize)]
pub struct StatsEntry {
    pub name: String,
    pub fingerprint: String,
    pub port: u16,
    pub status: ContainerStatus,
    pub created_at: String,
    pub last_used_at: String,
    pub idle_seconds: i64,
    pub idle_minutes: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<RuntimeReport>,
}

/// What the runtime itself says about the container, when reachable.
#[derive(Debug, Serialize)]
pub struct RuntimeReport {
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
}

pub async fn stats(State(state): State<AppState>) -> Json<Vec<StatsEntry>> {
    let now = Utc::now();
    let mut entries = Vec::new();

    for record in state.registry.snapshot() {
        let runtime = state
            .runtime
            .inspect_container(&record.name)
            .await
            .ok()
            .map(|report| RuntimeReport {
                state: report.state.to_string(),
                created: report.created,
            });

        let idle_seconds = record.idle_since(now).num_seconds().max(0);
        entries.push(StatsEntry {
            name: record.name.clone(),
            fingerprint: record.fingerprint.to_string(),
            port: record.host_port,
            status: record.status,
            created_at: record.created_at.to_rfc3339(),
            last_used_at: record.last_used_at.to_rfc3339(),
            idle_seconds,
            idle_minutes: (idle_seconds as f64 / 60.0 * 10.0).round() / 10.0,
            runtime,
        });
    }

    Json(entries)
}
