//! Sink metrics
//!
//! Counters for the expected steady-state drop conditions (late arrivals,
//! overflow, supersession) and overall queue traffic. All counters are
//! atomics; producers and consumers update them without taking the queue
//! lock.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Atomic counters shared between the queue and its observers.
#[derive(Debug, Default)]
pub struct SinkMetrics {
    pushed: AtomicU64,
    late_drops: AtomicU64,
    overflow_drops: AtomicU64,
    stale_released: AtomicU64,
    non_cacheable_replaced: AtomicU64,
    selects: AtomicU64,
    selects_empty: AtomicU64,
    flushes: AtomicU64,
}

impl SinkMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_push(&self) {
        self.pushed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_late_drop(&self) {
        self.late_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_overflow_drop(&self) {
        self.overflow_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_stale_released(&self, count: u64) {
        self.stale_released.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_non_cacheable_replaced(&self) {
        self.non_cacheable_replaced.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_select(&self, hit: bool) {
        if hit {
            self.selects.fetch_add(1, Ordering::Relaxed);
        } else {
            self.selects_empty.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            pushed: self.pushed.load(Ordering::Relaxed),
            late_drops: self.late_drops.load(Ordering::Relaxed),
            overflow_drops: self.overflow_drops.load(Ordering::Relaxed),
            stale_released: self.stale_released.load(Ordering::Relaxed),
            non_cacheable_replaced: self.non_cacheable_replaced.load(Ordering::Relaxed),
            selects: self.selects.load(Ordering::Relaxed),
            selects_empty: self.selects_empty.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}

/// Counter values captured by [`SinkMetrics::snapshot`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Samples accepted into the queue.
    pub pushed: u64,
    /// Samples soft-dropped for arriving below the low-water-mark.
    pub late_drops: u64,
    /// Samples evicted because the queue hit its capacity.
    pub overflow_drops: u64,
    /// Samples released after being superseded by a newer selection.
    pub stale_released: u64,
    /// Non-cacheable samples discarded by a newer non-cacheable push.
    pub non_cacheable_replaced: u64,
    /// Selections that returned a sample.
    pub selects: u64,
    /// Selections that found no sample ready.
    pub selects_empty: u64,
    /// Queue flushes.
    pub flushes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = SinkMetrics::new();
        metrics.record_push();
        metrics.record_push();
        metrics.record_late_drop();
        metrics.record_select(true);
        metrics.record_select(false);
        metrics.record_stale_released(3);

        let snap = metrics.snapshot();
        assert_eq!(snap.pushed, 2);
        assert_eq!(snap.late_drops, 1);
        assert_eq!(snap.selects, 1);
        assert_eq!(snap.selects_empty, 1);
        assert_eq!(snap.stale_released, 3);
        assert_eq!(snap.flushes, 0);
    }
}
