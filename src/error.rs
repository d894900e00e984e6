// ABOUTME: Application-wide error types for berth.
// ABOUTME: Uses thiserror with preserved source errors for startup failures.

use thiserror::Error;

use crate::runtime::{AdapterError, DetectionError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("runtime detection failed: {0}")]
    RuntimeDetection(#[from] DetectionError),

    #[error("container runtime error: {0}")]
    Runtime(#[from] AdapterError),
}

pub type Result<T> = std::result::Result<T, Error>;
