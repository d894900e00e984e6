// ABOUTME: Streaming reverse proxy from tenant requests to backend containers.
// ABOUTME: Authenticates, resolves the tenant binding, and forwards verbatim.

use super::{API_KEY_HEADER, ApiError, AppState};
use crate::oracle::Validation;
use crate::types::Credential;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::Response;
use tracing::debug;

/// Request headers copied through to the backend.
const FORWARDED_HEADERS: [header::HeaderName; 3] = [
    header::CONTENT_TYPE,
    header::AUTHORIZATION,
    header::USER_AGENT,
];

/// Hop-by-hop headers never forwarded from the backend response.
fn is_hop_by_hop(name: &str) -> bool {
    matches!(
        name,
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Fallback handler: every non-observability request lands here.
pub async fn forward(State(state): State<AppState>, req: Request) -> Result<Response, ApiError> {
    let (parts, body) = req.into_parts();

    let credential = extract_credential(&parts.headers)?;

    match state.oracle.validate(&credential).await {
        Validation::Valid => {}
        Validation::Invalid => return Err(ApiError::InvalidCredentials),
        Validation::Unavailable => return Err(ApiError::CredentialOracleUnavailable),
    }

    let binding = state.controller.resolve(&credential).await?;

    // The bare gateway root maps to the backend's MCP endpoint.
    let path = match parts.uri.path() {
        "" | "/" => "/mcp",
        p => p,
    };
    let mut target = format!("http://127.0.0.1:{}{}", binding.host_port, path);
    if let Some(query) = parts.uri.query() {
        target.push('?');
        target.push_str(query);
    }

    debug!(method = %parts.method, target = %target, container = %binding.container_name, "proxying request");

    let method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|_| ApiError::UpstreamUnreachable("unsupported request method".to_string()))?;

    let mut upstream = state.proxy_client.request(method, &target);
    for name in FORWARDED_HEADERS {
        if let Some(value) = parts.headers.get(&name) {
            upstream = upstream.header(name.as_str(), value.as_bytes());
        }
    }
    upstream = upstream
        .header("accept", "application/json, text/event-stream")
        .body(reqwest::Body::wrap_stream(body.into_data_stream()));

    let response = upstream.send().await.map_err(map_upstream_error)?;

    let status =
        StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = Response::builder().status(status);
    for (name, value) in response.headers() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    builder
        .body(Body::from_stream(response.bytes_stream()))
        .map_err(|e| ApiError::UpstreamUnreachable(e.to_string()))
}

fn extract_credential(headers: &HeaderMap) -> Result<Credential, ApiError> {
    let value = headers
        .get(API_KEY_HEADER)
        .ok_or(ApiError::MissingCredentials)?;
    let token = value
        .to_str()
        .map_err(|_| ApiError::MissingCredentials)?
        .trim();
    if token.is_empty() {
        return Err(ApiError::MissingCredentials);
    }
    Ok(Credential::new(token))
}

fn map_upstream_error(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::UpstreamTimeout
    } else {
        ApiError::UpstreamUnreachable(e.to_string())
    }
}
