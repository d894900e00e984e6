// ABOUTME: End-to-end tests of the HTTP surface against the fake runtime.
// ABOUTME: Auth mapping, proxy semantics, observability, error envelopes.

mod support;

use axum::Json;
use axum::Router;
use axum::http::HeaderMap;
use axum::routing::{get, post};
use berth::gateway::{self, API_KEY_HEADER, AppState};
use berth::oracle::Validation;
use berth::runtime::{ContainerRuntime, ContainerState};
use berth::types::Credential;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use support::{Fail, FakeRuntime, StaticOracle, controller_with};

fn state_with(
    runtime: &Arc<FakeRuntime>,
    oracle: Validation,
    low: u16,
    high: u16,
) -> AppState {
    let (controller, registry, _) = controller_with(runtime, low, high);
    AppState::new(
        controller,
        registry,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        Arc::new(StaticOracle(oracle)),
        Duration::from_secs(5),
    )
}

/// Serve the gateway on an ephemeral port.
async fn serve_gateway(state: AppState) -> SocketAddr {
    let app = gateway::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Serve a stand-in backend on the exact port the allocator will lease.
async fn serve_upstream(port: u16, app: Router) {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
}

async fn echo_headers(headers: HeaderMap, body: String) -> Json<Value> {
    Json(serde_json::json!({
        "path": "/mcp",
        "accept": headers.get("accept").and_then(|v| v.to_str().ok()),
        "content_type": headers.get("content-type").and_then(|v| v.to_str().ok()),
        "body": body,
    }))
}

#[tokio::test]
async fn missing_credential_header_is_400() {
    let runtime = FakeRuntime::new();
    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44000, 44010)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status_code"], 400);
    assert!(body["error"].as_str().unwrap().contains("X-Outline-API-Key"));
    assert!(body["timestamp"].is_string());
    assert_eq!(runtime.total_calls(), 0);
}

#[tokio::test]
async fn invalid_credential_is_401_with_no_runtime_calls() {
    let runtime = FakeRuntime::new();
    let addr = serve_gateway(state_with(&runtime, Validation::Invalid, 44010, 44020)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status_code"], 401);
    assert_eq!(runtime.total_calls(), 0);
}

#[tokio::test]
async fn oracle_outage_is_answered_like_an_invalid_key() {
    let runtime = FakeRuntime::new();
    let addr = serve_gateway(state_with(&runtime, Validation::Unavailable, 44020, 44030)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
    assert_eq!(runtime.total_calls(), 0);
}

#[tokio::test]
async fn proxies_root_to_the_backend_mcp_endpoint() {
    let runtime = FakeRuntime::new();
    let upstream = Router::new().route("/mcp", post(echo_headers));
    serve_upstream(44030, upstream).await;

    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44030, 44040)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .header("content-type", "application/json")
        .body("{\"hello\":1}")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["path"], "/mcp");
    assert_eq!(body["accept"], "application/json, text/event-stream");
    assert_eq!(body["content_type"], "application/json");
    assert_eq!(body["body"], "{\"hello\":1}");

    assert_eq!(runtime.create_count(), 1);
    let container = runtime.container("mcp-717876b49cd1").unwrap();
    assert_eq!(container.host_port, Some(44030));
}

#[tokio::test]
async fn proxies_arbitrary_paths_with_query() {
    let runtime = FakeRuntime::new();

    async fn note(
        axum::extract::Path(id): axum::extract::Path<String>,
        axum::extract::RawQuery(query): axum::extract::RawQuery,
    ) -> Json<Value> {
        Json(serde_json::json!({ "id": id, "query": query }))
    }

    let upstream = Router::new().route("/notes/{id}", get(note));
    serve_upstream(44040, upstream).await;

    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44040, 44050)).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/notes/42?full=yes", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["id"], "42");
    assert_eq!(body["query"], "full=yes");
}

#[tokio::test]
async fn resolve_failure_maps_to_503() {
    let runtime = FakeRuntime::new();
    runtime.fail_create(Some(Fail::Runtime));
    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44050, 44060)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 503);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status_code"], 503);
    assert!(body["error"].as_str().unwrap().contains("runtime"));
}

#[tokio::test]
async fn port_exhaustion_maps_to_503() {
    let runtime = FakeRuntime::new();
    let upstream = Router::new().fallback(|| async { "ok" });
    serve_upstream(44060, upstream).await;

    // A single-port window: the first tenant takes it all.
    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44060, 44061)).await;
    let client = reqwest::Client::new();

    let first = client
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = client
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-B")
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 503);
    let body: Value = second.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("ports"));
}

#[tokio::test]
async fn unreachable_backend_maps_to_502() {
    let runtime = FakeRuntime::new();
    // A running container is adopted without probing, so the proxy is the
    // first to notice nothing listens on its port.
    let name = Credential::new("tok-A").fingerprint().container_name();
    runtime.seed(&name, ContainerState::Running, Some(44070));

    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44070, 44080)).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
}

#[tokio::test]
async fn slow_backend_maps_to_504() {
    let runtime = FakeRuntime::new();

    async fn sleepy() -> &'static str {
        tokio::time::sleep(Duration::from_secs(3)).await;
        "late"
    }

    serve_upstream(44080, Router::new().fallback(sleepy)).await;

    let (controller, registry, _) = controller_with(&runtime, 44080, 44090);
    let state = AppState::new(
        controller,
        registry,
        runtime.clone() as Arc<dyn ContainerRuntime>,
        Arc::new(StaticOracle(Validation::Valid)),
        Duration::from_millis(500),
    );
    let addr = serve_gateway(state).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 504);
}

#[tokio::test]
async fn health_and_stats_reflect_usage() {
    let runtime = FakeRuntime::new();
    serve_upstream(44090, Router::new().fallback(|| async { "ok" })).await;
    let addr = serve_gateway(state_with(&runtime, Validation::Valid, 44090, 44100)).await;
    let client = reqwest::Client::new();

    // Observability endpoints answer without credentials and without
    // touching the runtime.
    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["containers_tracked"], 0);
    assert_eq!(health["containers_running"], 0);
    assert!(health["timestamp"].is_string());
    assert_eq!(runtime.total_calls(), 0);

    let stats: Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats.as_array().unwrap().len(), 0);

    client
        .post(format!("http://{}/", addr))
        .header(API_KEY_HEADER, "tok-A")
        .send()
        .await
        .unwrap();

    let health: Value = client
        .get(format!("http://{}/health", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["containers_tracked"], 1);
    assert_eq!(health["containers_running"], 1);

    let stats: Value = client
        .get(format!("http://{}/stats", addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let entry = &stats.as_array().unwrap()[0];
    assert_eq!(entry["name"], "mcp-717876b49cd1");
    assert_eq!(entry["fingerprint"], "717876b49cd1");
    assert_eq!(entry["port"], 44090);
    assert_eq!(entry["status"], "running");
    assert!(entry["idle_seconds"].as_i64().unwrap() >= 0);
    assert!(entry["idle_minutes"].as_f64().is_some());
    assert_eq!(entry["runtime"]["state"], "running");
}
