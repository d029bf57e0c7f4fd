//! Bridge configuration.
//!
//! The two host-form keys (`marathonURL`, `mesosDNS`) keep their wire
//! names; the tuning knobs are optional and fall back to defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from [`BridgeConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("marathonURL must not be empty")]
    MissingMarathonUrl,

    #[error("unsupported marathonURL scheme (only http:// is supported): {0}")]
    UnsupportedScheme(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BridgeConfig {
    #[serde(rename = "marathonURL")]
    pub marathon_url: String,
    #[serde(rename = "mesosDNS", default)]
    pub mesos_dns: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_read_retry_attempts")]
    pub read_retry_attempts: u32,
    #[serde(default = "default_service_port_floor")]
    pub service_port_floor: u32,
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_read_retry_attempts() -> u32 {
    3
}

fn default_service_port_floor() -> u32 {
    10_000
}

fn default_event_queue_capacity() -> usize {
    10_000
}

fn default_reconnect_initial_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

impl BridgeConfig {
    /// Config with defaults for everything but the two host-form keys.
    pub fn new(marathon_url: &str, mesos_dns: &str) -> Self {
        Self {
            marathon_url: marathon_url.to_string(),
            mesos_dns: mesos_dns.to_string(),
            request_timeout_secs: default_request_timeout_secs(),
            read_retry_attempts: default_read_retry_attempts(),
            service_port_floor: default_service_port_floor(),
            event_queue_capacity: default_event_queue_capacity(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: BridgeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.marathon_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingMarathonUrl);
        }
        if !url.starts_with("http://") {
            return Err(ConfigError::UnsupportedScheme(url.to_string()));
        }
        Ok(())
    }

    /// Marathon base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.marathon_url.trim().trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    pub fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }
}
