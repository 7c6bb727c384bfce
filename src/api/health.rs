//! Shared health state for the /health endpoint.
//! Updated by PropsCache around every refresh.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

/// Shared refresh health metrics. Updated by the cache, read by API.
#[derive(Default)]
pub struct HealthState {
    /// True while an aggregator run is in flight.
    pub refreshing: AtomicBool,
    /// Completed aggregator runs since start.
    pub refresh_count: AtomicU64,
    /// Record count of the most recent snapshot.
    pub last_record_count: AtomicU64,
    /// Targets that failed during the most recent refresh.
    pub last_failed_targets: AtomicU64,
    /// Unix milliseconds of the last completed refresh (0 = none).
    pub last_refresh_at_ms: AtomicI64,
}

impl HealthState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_refreshing(&self, v: bool) {
        self.refreshing.store(v, Ordering::Relaxed);
    }

    pub fn record_refresh(&self, records: usize, failed_targets: usize, at_ms: i64) {
        self.refresh_count.fetch_add(1, Ordering::Relaxed);
        self.last_record_count.store(records as u64, Ordering::Relaxed);
        self.last_failed_targets.store(failed_targets as u64, Ordering::Relaxed);
        self.last_refresh_at_ms.store(at_ms, Ordering::Relaxed);
    }

    pub fn refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Relaxed)
    }

    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }

    pub fn last_record_count(&self) -> u64 {
        self.last_record_count.load(Ordering::Relaxed)
    }

    pub fn last_failed_targets(&self) -> u64 {
        self.last_failed_targets.load(Ordering::Relaxed)
    }

    pub fn last_refresh_at_ms(&self) -> i64 {
        self.last_refresh_at_ms.load(Ordering::Relaxed)
    }
}
