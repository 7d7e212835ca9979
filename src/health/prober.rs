use super::{ErrorKind, ProbeOutcome};
use crate::config::ProbeMethod;
use crate::registry::ProviderDescriptor;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::debug;

const USER_AGENT: &str = concat!("statuscop-prober/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_LEN: usize = 100;

/// Performs a single health probe against one provider.
///
/// Implementations never fail: every transport problem is returned as data in
/// the outcome. One call is one outbound request, with no retries.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, provider: &ProviderDescriptor) -> ProbeOutcome;
}

/// Production prober backed by a shared `reqwest` client
pub struct HttpProber {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new(probe_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(probe_timeout)
            .connect_timeout(probe_timeout)
            .user_agent(USER_AGENT)
            // A redirect is an answer; following it would be a second request.
            .redirect(reqwest::redirect::Policy::none())
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(2)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            client,
            timeout: probe_timeout,
        })
    }

    fn transport_failure(&self, provider: &ProviderDescriptor, err: reqwest::Error) -> ProbeOutcome {
        if err.is_timeout() {
            return self.timed_out(provider);
        }

        if err.is_connect() {
            return ProbeOutcome::failure(&provider.id, ErrorKind::Connection, "Connection failed");
        }

        let mut message = err.to_string();
        if let Some((idx, _)) = message.char_indices().nth(MAX_ERROR_LEN) {
            message.truncate(idx);
        }
        ProbeOutcome::failure(&provider.id, ErrorKind::Unexpected, message)
    }

    fn timed_out(&self, provider: &ProviderDescriptor) -> ProbeOutcome {
        ProbeOutcome::failure(
            &provider.id,
            ErrorKind::Timeout,
            format!("Timeout after {:?}", self.timeout),
        )
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, provider: &ProviderDescriptor) -> ProbeOutcome {
        let request = match provider.method {
            ProbeMethod::Get => self.client.get(&provider.probe_url),
            // Unauthenticated POST with an empty body; any 4xx still proves liveness.
            ProbeMethod::Post => self.client.post(&provider.probe_url).json(&serde_json::json!({})),
        };

        let start = Instant::now();

        // The client has the same timeout; this bounds DNS and anything else it misses.
        let outcome = match timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => {
                let latency_ms = start.elapsed().as_millis() as u64;
                ProbeOutcome::response(&provider.id, response.status().as_u16(), latency_ms)
            }
            Ok(Err(e)) => self.transport_failure(provider, e),
            Err(_) => self.timed_out(provider),
        };

        debug!(
            "Probed {} ({}): status={:?} latency={:?} error={:?}",
            provider.id, provider.probe_url, outcome.http_status, outcome.latency_ms, outcome.error_kind
        );

        outcome
    }
}
