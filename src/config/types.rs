use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub metrics: Option<MetricsConfig>,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    /// Providers in display order. Order is preserved in every snapshot.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0:8000".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-provider request timeout in milliseconds
    #[serde(default = "default_probe_timeout")]
    pub timeout_ms: u64,

    /// Deadline for a whole aggregation run in milliseconds
    #[serde(default = "default_aggregate_deadline")]
    pub aggregate_deadline_ms: u64,

    /// Responses at or above this latency are reported as degraded
    #[serde(default = "default_degraded_threshold")]
    pub degraded_latency_threshold_ms: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn aggregate_deadline(&self) -> Duration {
        Duration::from_millis(self.aggregate_deadline_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_probe_timeout(),
            aggregate_deadline_ms: default_aggregate_deadline(),
            degraded_latency_threshold_ms: default_degraded_threshold(),
        }
    }
}

fn default_probe_timeout() -> u64 {
    10000 // 10 seconds
}

fn default_aggregate_deadline() -> u64 {
    12000 // 12 seconds
}

fn default_degraded_threshold() -> u64 {
    2000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How long a snapshot is served before a refresh is triggered
    #[serde(default = "default_cache_ttl")]
    pub ttl_ms: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_cache_ttl(),
        }
    }
}

fn default_cache_ttl() -> u64 {
    60000 // 60 seconds
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,

    pub display_name: String,

    pub probe_url: String,

    #[serde(default)]
    pub status_page_url: String,

    #[serde(default)]
    pub method: ProbeMethod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    #[default]
    #[serde(alias = "get")]
    Get,
    #[serde(alias = "post")]
    Post,
}
