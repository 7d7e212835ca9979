use super::{ErrorKind, Health};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health of one provider as shown to widget consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderStatus {
    #[serde(rename = "id")]
    pub provider_id: String,
    pub display_name: String,
    pub health: Health,
    pub latency_ms: Option<u64>,
    pub status_page_url: String,
    pub checked_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of one aggregation run. Never mutated; the cache swaps in a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    pub overall_health: Health,
    pub operational_count: usize,
    pub degraded_count: usize,
    pub down_count: usize,
    pub providers: Vec<ProviderStatus>,
}

impl Snapshot {
    pub fn new(providers: Vec<ProviderStatus>, generated_at: DateTime<Utc>) -> Self {
        let count = |health: Health| providers.iter().filter(|p| p.health == health).count();

        Self {
            generated_at,
            overall_health: overall_health(&providers),
            operational_count: count(Health::Operational),
            degraded_count: count(Health::Degraded),
            down_count: count(Health::Down),
            providers,
        }
    }

    pub fn provider(&self, id: &str) -> Option<&ProviderStatus> {
        self.providers.iter().find(|p| p.provider_id == id)
    }
}

/// Worst health across all providers.
///
/// Deliberately conservative: one provider down makes the whole snapshot down,
/// so an outage can't be averaged away by a list of healthy neighbours.
pub fn overall_health(providers: &[ProviderStatus]) -> Health {
    providers
        .iter()
        .map(|p| p.health)
        .max()
        .unwrap_or(Health::Operational)
}

#[cfg(test)]
pub(crate) fn status_with(id: &str, health: Health) -> ProviderStatus {
    ProviderStatus {
        provider_id: id.to_string(),
        display_name: id.to_string(),
        health,
        latency_ms: Some(100),
        status_page_url: String::new(),
        checked_at: Utc::now(),
        error_kind: None,
        error: None,
    }
}
