// ABOUTME: Configuration types and parsing for berth.yml.
// ABOUTME: Every key is optional; defaults match the production deployment.

mod limits;

pub use limits::parse_memory_limit;

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::types::ImageRef;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "berth.yml";
pub const CONFIG_FILENAME_ALT: &str = "berth.yaml";

/// Port the backend process listens on inside every tenant container.
pub const BACKEND_CONTAINER_PORT: u16 = 3000;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Backend image run for every tenant.
    #[serde(default = "default_image")]
    pub image: ImageRef,

    /// Address the gateway listens on.
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// Idle time after which a tenant container is stopped.
    #[serde(default = "default_idle_timeout", with = "humantime_serde")]
    pub idle_timeout: Duration,

    /// Cadence of the idle sweep.
    #[serde(default = "default_sweep_interval", with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Deadline for proxied upstream requests.
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Host port window leased to tenant containers.
    #[serde(default)]
    pub port_window: PortWindow,

    /// Per-container resource caps.
    #[serde(default)]
    pub resources: Resources,

    /// Explicit runtime selection; auto-detected when absent.
    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,

    /// Outline deployment validated against and injected into containers.
    #[serde(default = "default_outline_url")]
    pub outline_url: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PortWindow {
    pub low: u16,
    pub high: u16,
}

impl Default for PortWindow {
    fn default() -> Self {
        Self {
            low: 4000,
            high: 5000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Resources {
    /// Memory cap such as `256m` or `1g`.
    #[serde(default = "default_memory")]
    pub memory: String,

    /// CPU allowance in whole-core units.
    #[serde(default = "default_cpus")]
    pub cpus: f64,
}

impl Default for Resources {
    fn default() -> Self {
        Self {
            memory: default_memory(),
            cpus: default_cpus(),
        }
    }
}

impl Resources {
    pub fn memory_bytes(&self) -> Result<u64> {
        parse_memory_limit(&self.memory)
    }
}

fn default_image() -> ImageRef {
    // The default reference is well-formed; parse cannot fail on it.
    ImageRef::parse("ghcr.io/vortiago/mcp-outline:latest")
        .unwrap_or_else(|_| unreachable!("default image reference is valid"))
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8000))
}

fn default_idle_timeout() -> Duration {
    Duration::from_secs(900)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(90)
}

fn default_outline_url() -> String {
    "https://app.getoutline.com".to_string()
}

fn default_memory() -> String {
    "256m".to_string()
}

fn default_cpus() -> f64 {
    0.3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            image: default_image(),
            listen: default_listen(),
            idle_timeout: default_idle_timeout(),
            sweep_interval: default_sweep_interval(),
            request_timeout: default_request_timeout(),
            port_window: PortWindow::default(),
            resources: Resources::default(),
            runtime: None,
            outline_url: default_outline_url(),
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from `dir`, falling back to defaults when no
    /// config file exists.
    pub fn discover(dir: &Path) -> Result<Self> {
        for name in [CONFIG_FILENAME, CONFIG_FILENAME_ALT] {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_yaml(&raw)
    }

    fn validate(&self) -> Result<()> {
        if self.port_window.low >= self.port_window.high {
            return Err(Error::InvalidConfig(format!(
                "port window is empty: {}..{}",
                self.port_window.low, self.port_window.high
            )));
        }
        if !(self.resources.cpus > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "cpu allowance must be positive, got {}",
                self.resources.cpus
            )));
        }
        self.resources.memory_bytes()?;
        Ok(())
    }
}
