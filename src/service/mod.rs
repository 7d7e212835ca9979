use crate::cache::{HealthObserver, SnapshotCache};
use crate::config::Config;
use crate::health::{Aggregator, Classifier, HttpProber, Snapshot};
use crate::registry::ProviderRegistry;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The only entry point for request handlers.
///
/// Delegates to the snapshot cache. Never blocks longer than the aggregation
/// deadline, and never starts more than one aggregation at a time no matter
/// how many requests arrive together.
#[derive(Clone)]
pub struct StatusService {
    cache: SnapshotCache,
}

impl StatusService {
    pub fn new(cache: SnapshotCache) -> Self {
        Self { cache }
    }

    /// Wire the production stack from config: HTTP prober, classifier,
    /// aggregator and cache.
    pub fn from_config(config: &Config, observer: Option<Arc<dyn HealthObserver>>) -> Result<Self> {
        let registry = ProviderRegistry::from_config(&config.providers)?;
        let prober = Arc::new(HttpProber::new(config.probe.timeout())?);
        let classifier = Classifier::new(config.probe.degraded_latency_threshold_ms);

        info!(
            "Monitoring {} providers (probe timeout {:?}, deadline {:?}, ttl {:?}, degraded at {}ms)",
            registry.len(),
            config.probe.timeout(),
            config.probe.aggregate_deadline(),
            config.cache.ttl(),
            classifier.degraded_threshold_ms()
        );

        let aggregator = Arc::new(Aggregator::new(
            registry,
            prober,
            classifier,
            config.probe.aggregate_deadline(),
        ));

        let cache = match observer {
            Some(observer) => SnapshotCache::with_observer(aggregator, config.cache.ttl(), observer),
            None => SnapshotCache::new(aggregator, config.cache.ttl()),
        };

        Ok(Self::new(cache))
    }

    pub async fn get_status(&self) -> Arc<Snapshot> {
        self.cache.get_or_refresh().await
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache.ttl()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LogObserver;
    use crate::health::testing::{Script, ScriptedProber};
    use crate::health::Health;
    use crate::registry::descriptor;

    fn service(prober: Arc<ScriptedProber>) -> StatusService {
        let registry =
            ProviderRegistry::new(vec![descriptor("openai"), descriptor("anthropic")]).unwrap();
        let aggregator = Aggregator::new(registry, prober, Classifier::default(), Duration::from_secs(12));
        StatusService::new(SnapshotCache::new(Arc::new(aggregator), Duration::from_secs(60)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_status_bounded_when_empty_and_hung() {
        let prober = Arc::new(ScriptedProber::new().with("anthropic", Script::Hang));
        let status = service(prober);

        let started = tokio::time::Instant::now();
        let snapshot = status.get_status().await;

        assert!(started.elapsed() <= Duration::from_secs(12) + Duration::from_millis(100));
        assert_eq!(snapshot.providers.len(), 2);
        assert_eq!(snapshot.providers[1].health, Health::Down);
        assert_eq!(snapshot.overall_health, Health::Down);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_calls_hit_cache() {
        let prober = Arc::new(ScriptedProber::new());
        let status = service(prober.clone());

        let first = status.get_status().await;
        let second = status.get_status().await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(prober.calls(), 2);
        assert_eq!(status.cache_ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = Config::from_yaml(
            r#"
providers:
  - id: openai
    display_name: OpenAI
    probe_url: http://127.0.0.1:9/v1/models
"#,
        )
        .unwrap();

        let status = StatusService::from_config(&config, Some(Arc::new(LogObserver))).unwrap();
        assert_eq!(status.cache_ttl(), Duration::from_secs(60));
    }
}
