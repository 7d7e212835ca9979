use super::classifier::Classifier;
use super::prober::Prober;
use super::snapshot::Snapshot;
use super::{ErrorKind, ProbeOutcome};
use crate::metrics::Metrics;
use crate::registry::ProviderRegistry;
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, info, warn};

/// Fans probes out to every registered provider and assembles a snapshot.
pub struct Aggregator {
    registry: ProviderRegistry,
    prober: Arc<dyn Prober>,
    classifier: Classifier,
    deadline: Duration,
}

impl Aggregator {
    pub fn new(
        registry: ProviderRegistry,
        prober: Arc<dyn Prober>,
        classifier: Classifier,
        deadline: Duration,
    ) -> Self {
        Self {
            registry,
            prober,
            classifier,
            deadline,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Every provider down, for when no aggregation result is available at all
    pub fn unavailable(&self) -> Snapshot {
        let providers = self
            .registry
            .iter()
            .map(|provider| {
                let outcome = ProbeOutcome::failure(
                    &provider.id,
                    ErrorKind::Unexpected,
                    "Status check unavailable",
                );
                self.classifier.status(provider, &outcome)
            })
            .collect();

        Snapshot::new(providers, Utc::now())
    }

    /// Probe all providers in parallel and build a snapshot in registry order.
    ///
    /// Never fails. Providers that have not answered by the deadline are aborted
    /// and reported down with a timeout, and a prober that panics is reported
    /// down as unexpected. Dropping the returned future aborts all probes.
    pub async fn aggregate(&self) -> Snapshot {
        let started = Instant::now();
        let deadline = started + self.deadline;

        let mut probes = JoinSet::new();
        for (index, provider) in self.registry.iter().enumerate() {
            let prober = Arc::clone(&self.prober);
            let provider = Arc::clone(provider);
            probes.spawn(async move {
                let outcome = AssertUnwindSafe(prober.probe(&provider))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| {
                        ProbeOutcome::failure(&provider.id, ErrorKind::Unexpected, "Probe panicked")
                    });
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<ProbeOutcome>> = vec![None; self.registry.len()];
        loop {
            match timeout_at(deadline, probes.join_next()).await {
                Ok(Some(Ok((index, outcome)))) => outcomes[index] = Some(outcome),
                Ok(Some(Err(e))) => warn!("Probe task failed: {}", e),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Aggregation deadline of {:?} reached with {} probe(s) outstanding",
                        self.deadline,
                        probes.len()
                    );
                    probes.abort_all();
                    break;
                }
            }
        }

        let finished_at = Utc::now();
        let providers = self
            .registry
            .iter()
            .zip(outcomes)
            .map(|(provider, outcome)| {
                let outcome = outcome.unwrap_or_else(|| {
                    ProbeOutcome::failure(
                        &provider.id,
                        ErrorKind::Timeout,
                        format!("No response within {:?}", self.deadline),
                    )
                    .at(finished_at)
                });

                Metrics::record_probe(&provider.id, &outcome);
                let status = self.classifier.status(provider, &outcome);
                Metrics::set_provider_health(&provider.id, status.health);

                if let Some(error) = &status.error {
                    debug!("Provider {} is {}: {}", provider.id, status.health, error);
                }
                status
            })
            .collect();

        let snapshot = Snapshot::new(providers, Utc::now());
        let elapsed = started.elapsed();
        Metrics::record_aggregation(elapsed, snapshot.overall_health);

        info!(
            "Aggregated {} providers in {:?}: overall={} (operational={}, degraded={}, down={})",
            snapshot.providers.len(),
            elapsed,
            snapshot.overall_health,
            snapshot.operational_count,
            snapshot.degraded_count,
            snapshot.down_count
        );

        snapshot
    }
}
