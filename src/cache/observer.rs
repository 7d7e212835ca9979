use crate::health::{Health, Snapshot};
use tracing::{info, warn};

/// Hook invoked when a newly stored snapshot changes `overall_health`.
///
/// This is where outage alerts plug in. It runs on the refresh task, so
/// implementations should hand slow work off instead of blocking.
pub trait HealthObserver: Send + Sync {
    fn on_transition(&self, previous: Health, snapshot: &Snapshot);
}

/// Logs every overall health transition
pub struct LogObserver;

impl HealthObserver for LogObserver {
    fn on_transition(&self, previous: Health, snapshot: &Snapshot) {
        let affected: Vec<&str> = snapshot
            .providers
            .iter()
            .filter(|p| p.health != Health::Operational)
            .map(|p| p.provider_id.as_str())
            .collect();

        if snapshot.overall_health > previous {
            warn!(
                "Overall health changed {} -> {} (affected: {})",
                previous,
                snapshot.overall_health,
                affected.join(", ")
            );
        } else {
            info!(
                "Overall health changed {} -> {}",
                previous, snapshot.overall_health
            );
        }
    }
}
