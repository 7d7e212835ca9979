//! Scripted prober for aggregator and cache tests.

use super::{ErrorKind, ProbeOutcome, Prober};
use crate::registry::ProviderDescriptor;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Respond with `status` and report `latency_ms` after sleeping `delay`
    Respond {
        status: u16,
        latency_ms: u64,
        delay: Duration,
    },
    Fail(ErrorKind),
    Hang,
    Panic,
}

impl Script {
    pub(crate) fn ok(status: u16, latency_ms: u64) -> Self {
        Script::Respond {
            status,
            latency_ms,
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn after(self, delay: Duration) -> Self {
        match self {
            Script::Respond {
                status, latency_ms, ..
            } => Script::Respond {
                status,
                latency_ms,
                delay,
            },
            other => other,
        }
    }
}

/// Prober that plays back a fixed script per provider id and counts calls.
/// Providers without a script answer 200 in 100ms.
pub(crate) struct ScriptedProber {
    scripts: RwLock<HashMap<String, Script>>,
    calls: AtomicUsize,
}

impl ScriptedProber {
    pub(crate) fn new() -> Self {
        Self {
            scripts: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with(self, id: &str, script: Script) -> Self {
        self.scripts.write().insert(id.to_string(), script);
        self
    }

    /// Swap the script for `id` between aggregation runs
    pub(crate) fn set(&self, id: &str, script: Script) {
        self.scripts.write().insert(id.to_string(), script);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, provider: &ProviderDescriptor) -> ProbeOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .read()
            .get(&provider.id)
            .cloned()
            .unwrap_or_else(|| Script::ok(200, 100));

        match script {
            Script::Respond {
                status,
                latency_ms,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                ProbeOutcome::response(&provider.id, status, latency_ms)
            }
            Script::Fail(kind) => ProbeOutcome::failure(&provider.id, kind, kind.as_str()),
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("scripted probe panic for {}", provider.id),
        }
    }
}
