//! Load counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shared by every resolution that uses the same context.
#[derive(Debug, Default)]
pub struct LoadMetrics {
    file_loads: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    failures: AtomicU64,
    resolutions: AtomicU64,
    load_micros: AtomicU64,
}

/// Point-in-time copy of [`LoadMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub file_loads: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub failures: u64,
    pub resolutions: u64,
    pub total_load_time_us: u64,
}

impl LoadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_load(&self, elapsed: Duration) {
        self.file_loads.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.load_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_resolution(&self) {
        self.resolutions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            file_loads: self.file_loads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            resolutions: self.resolutions.load(Ordering::Relaxed),
            total_load_time_us: self.load_micros.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = LoadMetrics::new();
        metrics.record_load(Duration::from_micros(250));
        metrics.record_load(Duration::from_micros(50));
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        metrics.record_cache_miss();
        metrics.record_failure();
        metrics.record_resolution();

        let snap = metrics.snapshot();
        assert_eq!(snap.file_loads, 2);
        assert_eq!(snap.total_load_time_us, 300);
        assert_eq!(snap.cache_hits, 1);
        assert_eq!(snap.cache_misses, 2);
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.resolutions, 1);
    }
}
