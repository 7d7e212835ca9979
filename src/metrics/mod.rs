use crate::health::{Health, ProbeOutcome};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Duration;

/// Initialize metrics with descriptions
pub fn init_metrics() {
    describe_counter!(
        "probe_requests_total",
        "Total number of provider probes, labelled by HTTP status or failure kind"
    );
    describe_histogram!(
        "probe_latency_seconds",
        "Provider probe latency in seconds (responses only)"
    );
    describe_gauge!(
        "provider_health",
        "Provider health (1=operational, 0.5=degraded, 0=down)"
    );
    describe_counter!("aggregation_runs_total", "Total number of aggregation runs");
    describe_histogram!(
        "aggregation_duration_seconds",
        "Wall-clock duration of an aggregation run in seconds"
    );
    describe_gauge!(
        "overall_health",
        "Overall health of the latest snapshot (1=operational, 0.5=degraded, 0=down)"
    );
    describe_counter!(
        "status_cache_requests_total",
        "Status requests by cache result (hit, stale, miss)"
    );
    describe_counter!(
        "status_cache_refresh_failures_total",
        "Background refreshes that failed before storing a snapshot"
    );
}

/// Start Prometheus metrics server on given address
pub fn start_metrics_server(addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: std::net::SocketAddr = addr.parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    init_metrics();

    Ok(())
}

/// How a status request was served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheResult {
    Hit,
    Stale,
    Miss,
}

impl CacheResult {
    fn as_str(&self) -> &'static str {
        match self {
            CacheResult::Hit => "hit",
            CacheResult::Stale => "stale",
            CacheResult::Miss => "miss",
        }
    }
}

pub struct Metrics;

impl Metrics {
    /// Record one probe outcome
    #[inline]
    pub fn record_probe(provider: &str, outcome: &ProbeOutcome) {
        let labels = [
            ("provider", provider.to_string()),
            ("outcome", outcome.label()),
        ];

        counter!("probe_requests_total", &labels).increment(1);

        if let Some(latency_ms) = outcome.latency_ms {
            let labels = [("provider", provider.to_string())];
            histogram!("probe_latency_seconds", &labels)
                .record(Duration::from_millis(latency_ms).as_secs_f64());
        }
    }

    /// Set provider health gauge
    #[inline]
    pub fn set_provider_health(provider: &str, health: Health) {
        let labels = [("provider", provider.to_string())];
        gauge!("provider_health", &labels).set(health.as_gauge());
    }

    /// Record a finished aggregation run
    #[inline]
    pub fn record_aggregation(duration: Duration, overall: Health) {
        counter!("aggregation_runs_total").increment(1);
        histogram!("aggregation_duration_seconds").record(duration.as_secs_f64());
        gauge!("overall_health").set(overall.as_gauge());
    }

    #[inline]
    pub fn record_cache_request(result: CacheResult) {
        let labels = [("result", result.as_str())];
        counter!("status_cache_requests_total", &labels).increment(1);
    }

    #[inline]
    pub fn record_refresh_failure() {
        counter!("status_cache_refresh_failures_total").increment(1);
    }
}
