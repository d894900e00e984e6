// ABOUTME: Credential validation against the upstream Outline API.
// ABOUTME: Trait seam so tests can substitute a canned oracle.

use crate::types::Credential;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const VALIDATE_PATH: &str = "/api/auth.info";
const VALIDATE_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of validating a tenant credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Valid,
    Invalid,
    /// The upstream could not be reached or answered abnormally. The
    /// gateway's base policy treats this the same as Invalid, but the
    /// distinction stays visible for logging and future relaxation.
    Unavailable,
}

/// Boolean-ish oracle deciding whether a tenant credential is live.
#[async_trait]
pub trait CredentialOracle: Send + Sync {
    async fn validate(&self, credential: &Credential) -> Validation;
}

/// Validates tokens by calling the Outline auth endpoint with Bearer auth.
pub struct OutlineOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl OutlineOracle {
    /// `base_url` is the Outline deployment root, e.g.
    /// `https://app.getoutline.com`.
    pub fn new(base_url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(VALIDATE_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), VALIDATE_PATH),
        }
    }
}

#[async_trait]
impl CredentialOracle for OutlineOracle {
    async fn validate(&self, credential: &Credential) -> Validation {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .json(&serde_json::json!({}))
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => Validation::Valid,
            Ok(resp) if resp.status() == 401 || resp.status() == 403 => Validation::Invalid,
            Ok(resp) => {
                debug!(status = %resp.status(), "unexpected auth response");
                Validation::Unavailable
            }
            Err(e) => {
                debug!(error = %e, "credential check failed to reach upstream");
                Validation::Unavailable
            }
        }
    }
}
