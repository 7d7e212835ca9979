mod types;

pub use types::*;

use crate::registry::ProviderRegistry;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::debug;

/// Environment variables that override the file config.
pub const ENV_PROBE_TIMEOUT_MS: &str = "PROBE_TIMEOUT_MS";
pub const ENV_AGGREGATE_DEADLINE_MS: &str = "AGGREGATE_DEADLINE_MS";
pub const ENV_CACHE_TTL_MS: &str = "CACHE_TTL_MS";
pub const ENV_DEGRADED_LATENCY_THRESHOLD_MS: &str = "DEGRADED_LATENCY_THRESHOLD_MS";

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let mut config = Self::from_yaml(&content)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yml::from_str(content).with_context(|| "Failed to parse config file")
    }

    /// Apply `*_MS` overrides. `lookup` is `std::env::var` outside of tests.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&str, &mut u64); 4] = [
            (ENV_PROBE_TIMEOUT_MS, &mut self.probe.timeout_ms),
            (ENV_AGGREGATE_DEADLINE_MS, &mut self.probe.aggregate_deadline_ms),
            (ENV_CACHE_TTL_MS, &mut self.cache.ttl_ms),
            (
                ENV_DEGRADED_LATENCY_THRESHOLD_MS,
                &mut self.probe.degraded_latency_threshold_ms,
            ),
        ];

        for (key, slot) in targets {
            if let Some(raw) = lookup(key) {
                let value: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a whole number of milliseconds, got '{}'", key, raw))?;
                debug!("Config override from environment: {}={}", key, value);
                *slot = value;
            }
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.probe.timeout_ms == 0 {
            anyhow::bail!("probe.timeout_ms must be greater than zero");
        }

        // A probe must always be able to finish inside its parent run.
        if self.probe.timeout_ms > self.probe.aggregate_deadline_ms {
            anyhow::bail!(
                "probe.timeout_ms ({}) must not exceed probe.aggregate_deadline_ms ({})",
                self.probe.timeout_ms,
                self.probe.aggregate_deadline_ms
            );
        }

        if self.cache.ttl_ms == 0 {
            anyhow::bail!("cache.ttl_ms must be greater than zero");
        }

        self.server
            .address
            .parse::<std::net::SocketAddr>()
            .with_context(|| format!("Invalid server address: {}", self.server.address))?;

        if let Some(metrics) = &self.metrics {
            metrics
                .address
                .parse::<std::net::SocketAddr>()
                .with_context(|| format!("Invalid metrics address: {}", metrics.address))?;
        }

        ProviderRegistry::from_config(&self.providers)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
server:
  address: "127.0.0.1:8000"
probe:
  timeout_ms: 5000
providers:
  - id: openai
    display_name: OpenAI
    probe_url: https://api.openai.com/v1/models
    status_page_url: https://status.openai.com/
  - id: anthropic
    display_name: Anthropic
    probe_url: https://api.anthropic.com/v1/messages
    status_page_url: https://status.anthropic.com/
    method: POST
"#;

    #[test]
    fn test_parse_with_defaults() {
        let config = Config::from_yaml(SAMPLE).unwrap();

        assert_eq!(config.probe.timeout_ms, 5000);
        assert_eq!(config.probe.aggregate_deadline_ms, 12000);
        assert_eq!(config.probe.degraded_latency_threshold_ms, 2000);
        assert_eq!(config.cache.ttl_ms, 60000);
        assert!(config.metrics.is_none());

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[0].id, "openai");
        assert_eq!(config.providers[0].method, ProbeMethod::Get);
        assert_eq!(config.providers[1].method, ProbeMethod::Post);

        config.validate().unwrap();
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        let env: HashMap<&str, &str> = [
            (ENV_PROBE_TIMEOUT_MS, "3000"),
            (ENV_CACHE_TTL_MS, " 30000 "),
            (ENV_DEGRADED_LATENCY_THRESHOLD_MS, "1500"),
        ]
        .into_iter()
        .collect();

        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.probe.timeout_ms, 3000);
        assert_eq!(config.probe.aggregate_deadline_ms, 12000);
        assert_eq!(config.cache.ttl_ms, 30000);
        assert_eq!(config.probe.degraded_latency_threshold_ms, 1500);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        let result = config.apply_env_overrides(|key| {
            (key == ENV_AGGREGATE_DEADLINE_MS).then(|| "12s".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_probe_timeout_must_fit_deadline() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.probe.timeout_ms = 15000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_registry_rejected() {
        let config = Config::from_yaml("server:\n  address: \"127.0.0.1:8000\"\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let mut config = Config::from_yaml(SAMPLE).unwrap();
        config.cache.ttl_ms = 0;
        assert!(config.validate().is_err());
    }
}
