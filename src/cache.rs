use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info};

use crate::aggregator::{AggregateStats, Aggregator};
use crate::api::health::HealthState;
use crate::types::PropRecord;

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// One complete aggregator result. Never mutated after construction.
#[derive(Debug, Default)]
pub struct CacheSnapshot {
    pub records: Vec<PropRecord>,
    /// None until the first refresh completes; such a snapshot is always stale.
    pub captured_at: Option<DateTime<Utc>>,
    pub stats: AggregateStats,
}

impl CacheSnapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        match self.captured_at {
            Some(at) => now - at <= ttl,
            None => false,
        }
    }

    /// Fractional minutes since capture; 0 when never captured.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        match self.captured_at {
            Some(at) => (now - at).num_milliseconds() as f64 / 60_000.0,
            None => 0.0,
        }
    }
}

/// Result of [`PropsCache::get`].
#[derive(Debug, Clone)]
pub struct CacheRead {
    pub snapshot: Arc<CacheSnapshot>,
    /// False when this call (or one it waited on) had to run the aggregator.
    pub from_cache: bool,
}

// ---------------------------------------------------------------------------
// PropsCache
// ---------------------------------------------------------------------------

/// Time-bounded cache over the aggregator output.
///
/// Readers clone the current `Arc<CacheSnapshot>` and never block each other.
/// Every aggregator run happens while holding `refresh_gate`, so at most one
/// scrape is in flight; callers that find the cache stale queue on the gate
/// and re-check freshness once they hold it.
///
/// Runs are spawned and own the gate guard, so a caller that goes away
/// (client disconnect, timeout) never abandons a scrape halfway.
pub struct PropsCache {
    aggregator: Aggregator,
    ttl: TimeDelta,
    current: RwLock<Arc<CacheSnapshot>>,
    refresh_gate: Arc<Mutex<()>>,
    health: Arc<HealthState>,
}

impl PropsCache {
    pub fn new(aggregator: Aggregator, ttl: Duration, health: Arc<HealthState>) -> Arc<Self> {
        Arc::new(Self {
            aggregator,
            ttl: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            current: RwLock::new(Arc::new(CacheSnapshot::empty())),
            refresh_gate: Arc::new(Mutex::new(())),
            health,
        })
    }

    pub fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Current snapshot without triggering a refresh.
    pub fn peek(&self) -> Arc<CacheSnapshot> {
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Serve the held snapshot if fresh, otherwise refresh it first.
    pub async fn get(self: &Arc<Self>) -> CacheRead {
        let snapshot = self.peek();
        if snapshot.is_fresh(Utc::now(), self.ttl) {
            debug!(
                age_minutes = snapshot.age_minutes(Utc::now()),
                "Using cached props"
            );
            return CacheRead { snapshot, from_cache: true };
        }

        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;

        // Another caller may have refreshed while we waited on the gate.
        let snapshot = self.peek();
        if snapshot.is_fresh(Utc::now(), self.ttl) {
            debug!("Props refreshed by a concurrent caller");
            return CacheRead { snapshot, from_cache: false };
        }

        info!("Cache expired or empty, scraping fresh props");
        CacheRead {
            snapshot: self.spawn_refresh(gate, false).await,
            from_cache: false,
        }
    }

    /// Drop the held snapshot and run the aggregator regardless of freshness.
    pub async fn force_refresh(self: &Arc<Self>) -> Arc<CacheSnapshot> {
        let gate = Arc::clone(&self.refresh_gate).lock_owned().await;
        info!("Forcing props cache refresh");
        self.spawn_refresh(gate, true).await
    }

    /// Run the aggregator in its own task holding `gate` until the new
    /// snapshot is in place. The returned future may be dropped freely.
    async fn spawn_refresh(
        self: &Arc<Self>,
        gate: OwnedMutexGuard<()>,
        discard_first: bool,
    ) -> Arc<CacheSnapshot> {
        let cache = Arc::clone(self);
        let task = tokio::spawn(async move {
            let _gate = gate;
            if discard_first {
                cache.replace(Arc::new(CacheSnapshot::empty()));
            }
            cache.refresh_locked().await
        });

        match task.await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Props refresh task failed: {e}");
                self.peek()
            }
        }
    }

    /// Caller must hold `refresh_gate`.
    async fn refresh_locked(&self) -> Arc<CacheSnapshot> {
        let _refreshing = RefreshingFlag::raise(&self.health);
        let (records, stats) = self.aggregator.run_with_stats().await;
        let captured_at = Utc::now();

        self.health
            .record_refresh(records.len(), stats.targets_failed, captured_at.timestamp_millis());

        let snapshot = Arc::new(CacheSnapshot {
            records,
            captured_at: Some(captured_at),
            stats,
        });
        self.replace(Arc::clone(&snapshot));
        snapshot
    }

    fn replace(&self, snapshot: Arc<CacheSnapshot>) {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }
}

/// Keeps `HealthState::refreshing` set for its lifetime, cleared on drop
/// (including unwinding).
struct RefreshingFlag<'a>(&'a HealthState);

impl<'a> RefreshingFlag<'a> {
    fn raise(health: &'a HealthState) -> Self {
        health.set_refreshing(true);
        Self(health)
    }
}

impl Drop for RefreshingFlag<'_> {
    fn drop(&mut self) {
        self.0.set_refreshing(false);
    }
}
