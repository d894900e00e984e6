// ABOUTME: HTTP error envelope for the gateway.
// ABOUTME: Maps core errors onto status codes with a JSON body.

use crate::lifecycle::ResolveError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing X-Outline-API-Key header")]
    MissingCredentials,

    #[error("invalid Outline API key")]
    InvalidCredentials,

    #[error("credential service unavailable, treating key as invalid")]
    CredentialOracleUnavailable,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream container unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingCredentials => StatusCode::BAD_REQUEST,
            // Base policy answers oracle outages conservatively, as if the
            // key were invalid.
            ApiError::InvalidCredentials | ApiError::CredentialOracleUnavailable => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::Resolve(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    status_code: u16,
    timestamp: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
            status_code: status.as_u16(),
            timestamp: Utc::now().to_rfc3339(),
        };
        (status, Json(body)).into_response()
    }
}
