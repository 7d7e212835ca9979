mod observer;

pub use observer::{HealthObserver, LogObserver};

use crate::health::{Aggregator, Snapshot};
use crate::metrics::{CacheResult, Metrics};
use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};
use tracing::{debug, error, warn};

/// Something that can produce a fresh snapshot. Implemented by [`Aggregator`].
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn aggregate(&self) -> Snapshot;

    /// Upper bound on how long `aggregate` can take
    fn deadline(&self) -> Duration;

    /// Served when the very first aggregation failed and nothing is cached yet
    fn unavailable(&self) -> Snapshot;
}

#[async_trait]
impl SnapshotSource for Aggregator {
    async fn aggregate(&self) -> Snapshot {
        Aggregator::aggregate(self).await
    }

    fn deadline(&self) -> Duration {
        Aggregator::deadline(self)
    }

    fn unavailable(&self) -> Snapshot {
        Aggregator::unavailable(self)
    }
}

struct CacheEntry {
    snapshot: Arc<Snapshot>,
    expires_at: Instant,
}

struct CacheInner {
    source: Arc<dyn SnapshotSource>,
    ttl: Duration,
    entry: ArcSwapOption<CacheEntry>,
    /// Set while an aggregation is in flight. Only one may run at a time.
    refreshing: AtomicBool,
    /// Bumped after every refresh attempt, successful or not
    refreshed: watch::Sender<u64>,
    observer: Option<Arc<dyn HealthObserver>>,
}

/// Clears the refresh flag even if the refresh task unwinds
struct RefreshGuard<'a>(&'a AtomicBool);

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// TTL cache for the latest snapshot with serve-stale-while-refreshing.
///
/// Reads are lock-free (`arc-swap`). When the cached snapshot is stale, the
/// first reader starts a single background refresh and every reader gets the
/// stale snapshot immediately. When nothing is cached yet, callers wait for
/// one shared aggregation instead of each starting their own.
#[derive(Clone)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

impl SnapshotCache {
    pub fn new(source: Arc<dyn SnapshotSource>, ttl: Duration) -> Self {
        Self::build(source, ttl, None)
    }

    pub fn with_observer(
        source: Arc<dyn SnapshotSource>,
        ttl: Duration,
        observer: Arc<dyn HealthObserver>,
    ) -> Self {
        Self::build(source, ttl, Some(observer))
    }

    fn build(
        source: Arc<dyn SnapshotSource>,
        ttl: Duration,
        observer: Option<Arc<dyn HealthObserver>>,
    ) -> Self {
        let (refreshed, _) = watch::channel(0);
        Self {
            inner: Arc::new(CacheInner {
                source,
                ttl,
                entry: ArcSwapOption::empty(),
                refreshing: AtomicBool::new(false),
                refreshed,
                observer,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.inner.ttl
    }

    /// Current snapshot without triggering any refresh
    pub fn peek(&self) -> Option<Arc<Snapshot>> {
        self.inner
            .entry
            .load_full()
            .map(|entry| Arc::clone(&entry.snapshot))
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.refreshing.load(Ordering::Acquire)
    }

    pub async fn get_or_refresh(&self) -> Arc<Snapshot> {
        if let Some(entry) = self.inner.entry.load_full() {
            if Instant::now() < entry.expires_at {
                Metrics::record_cache_request(CacheResult::Hit);
            } else {
                Metrics::record_cache_request(CacheResult::Stale);
                self.spawn_refresh();
            }
            return Arc::clone(&entry.snapshot);
        }

        Metrics::record_cache_request(CacheResult::Miss);
        self.fill().await
    }

    /// Empty cache: wait for the shared first aggregation
    async fn fill(&self) -> Arc<Snapshot> {
        let mut refreshed = self.inner.refreshed.subscribe();

        // A fill may have landed between the fast-path check and subscribing.
        if let Some(snapshot) = self.peek() {
            return snapshot;
        }

        self.spawn_refresh();

        let wait = self.inner.source.deadline();
        if timeout(wait, refreshed.changed()).await.is_err() {
            warn!("No snapshot produced within {:?}", wait);
        }

        match self.peek() {
            Some(snapshot) => snapshot,
            None => {
                warn!("Initial status aggregation failed, serving placeholder snapshot");
                Arc::new(self.inner.source.unavailable())
            }
        }
    }

    fn spawn_refresh(&self) {
        if self
            .inner
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Status refresh already in flight");
            return;
        }

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let guard = RefreshGuard(&inner.refreshing);

            // Observer panics raised from `store` are caught here as well.
            let refresh = async {
                let snapshot = inner.source.aggregate().await;
                inner.store(Arc::new(snapshot));
            };
            if AssertUnwindSafe(refresh).catch_unwind().await.is_err() {
                error!("Status refresh panicked");
                Metrics::record_refresh_failure();
            }

            // Waiters may retry as soon as they wake, so clear the flag first.
            drop(guard);
            inner.refreshed.send_modify(|generation| *generation += 1);
        });
    }
}

impl CacheInner {
    fn store(&self, snapshot: Arc<Snapshot>) {
        let entry = Arc::new(CacheEntry {
            snapshot: Arc::clone(&snapshot),
            expires_at: Instant::now() + self.ttl,
        });

        // Never roll back to an older snapshot.
        let previous = self.entry.rcu(|current| match current {
            Some(current) if current.snapshot.generated_at > snapshot.generated_at => {
                Some(Arc::clone(current))
            }
            _ => Some(Arc::clone(&entry)),
        });

        let Some(previous) = previous else {
            debug!("Cached first status snapshot");
            return;
        };

        if previous.snapshot.generated_at > snapshot.generated_at {
            warn!("Discarded status snapshot older than the cached one");
            return;
        }

        let before = previous.snapshot.overall_health;
        if before != snapshot.overall_health {
            if let Some(observer) = &self.observer {
                observer.on_transition(before, &snapshot);
            }
        }
    }
}
