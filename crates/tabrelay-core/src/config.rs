//! Agent and collector configuration.
//!
//! Both configurations default to the fixed local contract: the agent posts
//! to `http://127.0.0.1:8080/` every 3000 ms and the collector listens on
//! that address. The agent has no environment surface; embedders construct
//! `AgentConfig` directly. The collector binary reads its overrides from the
//! environment.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Default collector endpoint.
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8080/";

/// Default heartbeat period.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_millis(3000);

/// Default collector port.
pub const DEFAULT_PORT: u16 = 8080;

/// Tab reporter configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Endpoint every report is POSTed to.
    pub collector_url: String,
    /// Period of the unconditional heartbeat report.
    pub heartbeat_interval: Duration,
    /// Per-request timeout. `None` leaves it to the transport.
    pub request_timeout: Option<Duration>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            heartbeat_interval: DEFAULT_HEARTBEAT,
            request_timeout: None,
        }
    }
}

impl AgentConfig {
    /// Reject settings the agent cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval.is_zero() {
            return Err(Error::Config("heartbeat interval must be non-zero".into()));
        }
        if !self.collector_url.starts_with("http://") && !self.collector_url.starts_with("https://") {
            return Err(Error::Config(format!(
                "collector url must be http(s): {}",
                self.collector_url
            )));
        }
        Ok(())
    }
}

/// Local collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectorConfig {
    pub host: String,
    pub port: u16,
    /// File overwritten with every received payload.
    pub log_path: PathBuf,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: DEFAULT_PORT,
            log_path: PathBuf::from("log.json"),
        }
    }
}

impl CollectorConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(host) = lookup("TABRELAY_HOST").filter(|h| !h.is_empty()) {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            match port.parse() {
                Ok(p) => config.port = p,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(path) = lookup("TABRELAY_LOG_PATH").filter(|p| !p.is_empty()) {
            config.log_path = PathBuf::from(path);
        }
        config
    }

    /// Socket address string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
