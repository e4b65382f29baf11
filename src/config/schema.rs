//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults so a minimal config only names the API.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for a sync client.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SyncConfig {
    /// Upstream API and client identity.
    pub api: ApiConfig,

    /// Transport the client starts with.
    pub mode: FetchMode,

    /// Polling transport settings.
    pub polling: PollingConfig,

    /// Streaming transport settings.
    pub streaming: StreamingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Upstream API and client identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the feature API (e.g., "https://flags.example.com/api/").
    pub url: String,

    /// Application name sent with every request.
    pub app_name: String,

    /// Instance identifier sent with every request.
    pub instance_id: String,

    /// Extra headers sent with every request (e.g., authorization).
    pub custom_headers: BTreeMap<String, String>,

    /// Per-request timeout for polls.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:4242/api/".to_string(),
            app_name: "flag-sync".to_string(),
            instance_id: "flag-sync-instance".to_string(),
            custom_headers: BTreeMap::new(),
            request_timeout_secs: 10,
        }
    }
}

impl ApiConfig {
    /// Polling endpoint.
    pub fn features_url(&self) -> Result<url::Url, url::ParseError> {
        self.endpoint("client/features")
    }

    /// Streaming endpoint.
    pub fn streaming_url(&self) -> Result<url::Url, url::ParseError> {
        self.endpoint("client/streaming")
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, url::ParseError> {
        let base = if self.url.ends_with('/') {
            url::Url::parse(&self.url)?
        } else {
            url::Url::parse(&format!("{}/", self.url))?
        };
        base.join(path)
    }
}

/// Initial transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    #[default]
    Polling,
    Streaming,
}

impl std::str::FromStr for FetchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "polling" => Ok(FetchMode::Polling),
            "streaming" => Ok(FetchMode::Streaming),
            other => Err(format!("unknown fetch mode: {other}")),
        }
    }
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Polling => f.write_str("polling"),
            FetchMode::Streaming => f.write_str("streaming"),
        }
    }
}

/// Polling transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Fixed poll cadence. Zero means a single fetch.
    pub interval_secs: u64,

    /// Upper bound on the effective retry interval under failure.
    pub max_backoff_secs: u64,

    /// Fetch once on the caller's task before scheduling begins.
    pub synchronous_startup: bool,

    /// Never schedule polling.
    pub disabled: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 15,
            max_backoff_secs: 300,
            synchronous_startup: false,
            disabled: false,
        }
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Streaming transport settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamingConfig {
    /// Soft failures within the window that trigger failover.
    pub max_fails: usize,

    /// Sliding window for soft failures.
    pub fail_window_ms: u64,

    /// SSE connect timeout.
    pub connect_timeout_secs: u64,

    /// SSE read timeout; a silent connection is considered dead after this.
    pub read_timeout_secs: u64,

    /// Pause before reconnecting after a rejected payload.
    pub reconnect_delay_ms: u64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            max_fails: 5,
            fail_window_ms: 60_000,
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            reconnect_delay_ms: 1_000,
        }
    }
}

impl StreamingConfig {
    pub fn fail_window(&self) -> Duration {
        Duration::from_millis(self.fail_window_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
