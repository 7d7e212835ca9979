use super::snapshot::ProviderStatus;
use super::{Health, ProbeOutcome};
use crate::registry::ProviderDescriptor;

/// Default latency at which an otherwise healthy response counts as degraded
pub const DEFAULT_DEGRADED_THRESHOLD_MS: u64 = 2000;

/// Maps raw probe outcomes to health verdicts. Pure and cheap to copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classifier {
    degraded_threshold_ms: u64,
}

impl Classifier {
    pub fn new(degraded_threshold_ms: u64) -> Self {
        Self {
            degraded_threshold_ms,
        }
    }

    pub fn degraded_threshold_ms(&self) -> u64 {
        self.degraded_threshold_ms
    }

    #[inline]
    pub fn classify(&self, outcome: &ProbeOutcome) -> Health {
        let Some(status) = outcome.http_status else {
            return Health::Down;
        };

        // Anything below 200 is not a final response we expect from an API.
        if !(200..500).contains(&status) {
            return Health::Down;
        }

        // 4xx lands here on purpose. Probes run without credentials, so 400/401/404
        // prove the API is answering, and a 429 means the probe itself was rate
        // limited, not that the provider is down. Only latency decides from here.
        match outcome.latency_ms {
            Some(latency) if latency >= self.degraded_threshold_ms => Health::Degraded,
            Some(_) => Health::Operational,
            // A response always carries a latency; treat a missing one as unknown.
            None => Health::Degraded,
        }
    }

    /// Human-readable reason for anything other than operational
    pub fn describe(&self, outcome: &ProbeOutcome, health: Health) -> Option<String> {
        match (health, outcome.http_status) {
            (Health::Operational, _) => None,
            (Health::Degraded, _) => outcome
                .latency_ms
                .map(|latency| format!("High latency: {}ms", latency)),
            (Health::Down, Some(status)) if status >= 500 => {
                Some(format!("Server error: HTTP {}", status))
            }
            (Health::Down, Some(status)) => Some(format!("Unexpected status: HTTP {}", status)),
            (Health::Down, None) => outcome
                .error
                .clone()
                .or_else(|| outcome.error_kind.map(|kind| kind.as_str().to_string())),
        }
    }

    /// Build the public status for one provider. `health` is always derived here.
    pub fn status(&self, provider: &ProviderDescriptor, outcome: &ProbeOutcome) -> ProviderStatus {
        let health = self.classify(outcome);

        ProviderStatus {
            provider_id: provider.id.clone(),
            display_name: provider.display_name.clone(),
            status_page_url: provider.status_page_url.clone(),
            health,
            latency_ms: outcome.latency_ms,
            checked_at: outcome.checked_at,
            error_kind: outcome.error_kind,
            error: self.describe(outcome, health),
        }
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_DEGRADED_THRESHOLD_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::ErrorKind;
    use crate::registry::descriptor;

    const THRESHOLD: u64 = 2000;

    fn outcome(status: Option<u16>, latency: Option<u64>) -> ProbeOutcome {
        match status {
            Some(code) => ProbeOutcome::response("test", code, latency.unwrap_or(0)),
            None => ProbeOutcome::failure("test", ErrorKind::Connection, "Connection failed"),
        }
    }

    #[test]
    fn test_boundary_table() {
        let classifier = Classifier::new(THRESHOLD);
        let cases = [
            (None, None, Health::Down),
            (Some(500), Some(10), Health::Down),
            (Some(503), Some(10), Health::Down),
            (Some(200), Some(THRESHOLD - 1), Health::Operational),
            (Some(200), Some(THRESHOLD), Health::Degraded),
            (Some(200), Some(THRESHOLD + 1), Health::Degraded),
            (Some(401), Some(100), Health::Operational),
            (Some(499), Some(100), Health::Operational),
            (Some(429), Some(100), Health::Operational),
            (Some(429), Some(THRESHOLD), Health::Degraded),
            (Some(101), Some(100), Health::Down),
            (Some(302), Some(100), Health::Operational),
        ];

        for (status, latency, expected) in cases {
            let o = outcome(status, latency);
            assert_eq!(
                classifier.classify(&o),
                expected,
                "status={:?} latency={:?}",
                status,
                latency
            );
            // Same input, same verdict.
            assert_eq!(classifier.classify(&o), classifier.classify(&o.clone()));
        }
    }

    #[test]
    fn test_threshold_is_configurable() {
        let o = outcome(Some(200), Some(800));
        assert_eq!(Classifier::new(2000).classify(&o), Health::Operational);
        assert_eq!(Classifier::new(500).classify(&o), Health::Degraded);
    }

    #[test]
    fn test_descriptions() {
        let classifier = Classifier::default();

        let slow = outcome(Some(200), Some(2500));
        assert_eq!(
            classifier.describe(&slow, classifier.classify(&slow)).as_deref(),
            Some("High latency: 2500ms")
        );

        let broken = outcome(Some(503), Some(40));
        assert_eq!(
            classifier.describe(&broken, classifier.classify(&broken)).as_deref(),
            Some("Server error: HTTP 503")
        );

        let refused = outcome(None, None);
        assert_eq!(
            classifier.describe(&refused, Health::Down).as_deref(),
            Some("Connection failed")
        );

        let fine = outcome(Some(200), Some(40));
        assert_eq!(classifier.describe(&fine, Health::Operational), None);
    }

    #[test]
    fn test_status_copies_descriptor_fields() {
        let provider = descriptor("openai");
        let o = ProbeOutcome::response("openai", 200, 120);

        let status = Classifier::default().status(&provider, &o);
        assert_eq!(status.provider_id, "openai");
        assert_eq!(status.display_name, "OPENAI");
        assert_eq!(status.status_page_url, "https://status.openai.test/");
        assert_eq!(status.health, Health::Operational);
        assert_eq!(status.latency_ms, Some(120));
        assert_eq!(status.checked_at, o.checked_at);
    }
}
