mod aggregator;
mod classifier;
mod prober;
mod snapshot;
#[cfg(test)]
pub(crate) mod testing;

pub use aggregator::Aggregator;
pub use classifier::{Classifier, DEFAULT_DEGRADED_THRESHOLD_MS};
pub use prober::{HttpProber, Prober};
pub use snapshot::{overall_health, ProviderStatus, Snapshot};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tri-state health verdict for a single provider or a whole snapshot.
///
/// Variants are ordered from best to worst so the worst of a set is its `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Operational,
    Degraded,
    Down,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Operational => "operational",
            Health::Degraded => "degraded",
            Health::Down => "down",
        }
    }

    /// Gauge value exported to Prometheus (1=operational, 0.5=degraded, 0=down)
    pub fn as_gauge(&self) -> f64 {
        match self {
            Health::Operational => 1.0,
            Health::Degraded => 0.5,
            Health::Down => 0.0,
        }
    }
}

impl fmt::Display for Health {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a probe produced no HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Per-probe timeout or the aggregation deadline expired
    Timeout,
    /// DNS failure, refused or reset connection, TLS handshake failure
    Connection,
    /// Anything else, including a probe task that panicked
    Unexpected,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Connection => "connection",
            ErrorKind::Unexpected => "unexpected",
        }
    }
}

/// Raw result of one probe attempt. Consumed by the classifier, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub provider_id: String,
    /// Only set when a response (of any status) was received
    pub latency_ms: Option<u64>,
    pub http_status: Option<u16>,
    pub error_kind: Option<ErrorKind>,
    pub error: Option<String>,
    pub checked_at: DateTime<Utc>,
}

impl ProbeOutcome {
    pub fn response(provider_id: impl Into<String>, http_status: u16, latency_ms: u64) -> Self {
        Self {
            provider_id: provider_id.into(),
            latency_ms: Some(latency_ms),
            http_status: Some(http_status),
            error_kind: None,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn failure(
        provider_id: impl Into<String>,
        kind: ErrorKind,
        error: impl Into<String>,
    ) -> Self {
        Self {
            provider_id: provider_id.into(),
            latency_ms: None,
            http_status: None,
            error_kind: Some(kind),
            error: Some(error.into()),
            checked_at: Utc::now(),
        }
    }

    pub fn at(mut self, checked_at: DateTime<Utc>) -> Self {
        self.checked_at = checked_at;
        self
    }

    /// Short label used for the `outcome` metric label
    pub fn label(&self) -> String {
        match (self.http_status, self.error_kind) {
            (Some(status), _) => status.to_string(),
            (None, Some(kind)) => kind.as_str().to_string(),
            (None, None) => ErrorKind::Unexpected.as_str().to_string(),
        }
    }
}
