//! Time-ordered sample queue and selector
//!
//! The decode thread pushes [`FrameSample`]s as they come off the
//! decoder; render threads ask [`SampleQueue::select_for_time`] which
//! sample belongs on screen for the current presentation-clock value.
//! The queue is the sole shared-mutation point: one lock serializes push
//! against selection and eviction, and samples come back as
//! `Arc<FrameSample>` so reads after selection need no synchronization.
//!
//! Samples arriving with a timestamp below the low-water-mark (decode
//! finished too late to ever be shown) are soft-dropped and counted, not
//! treated as errors.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::sample::FrameSample;
use crate::telemetry::SinkMetrics;
use crate::time::MediaTime;

/// Sample queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum pending samples before the oldest unselected one is
    /// evicted.
    pub capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

struct Entry {
    sample: Arc<FrameSample>,
    seq: u64,
}

struct QueueState {
    /// Sorted ascending by (timestamp, push sequence).
    entries: Vec<Entry>,
    /// (timestamp, seq) of the currently displayed sample.
    selected: Option<(MediaTime, u64)>,
    /// No sample below this timestamp will ever be selected again.
    low_water: Option<MediaTime>,
    next_seq: u64,
}

/// Time-ordered buffer of pending frame samples.
pub struct SampleQueue {
    state: Mutex<QueueState>,
    config: QueueConfig,
    metrics: Arc<SinkMetrics>,
}

impl Default for SampleQueue {
    fn default() -> Self {
        Self::new(QueueConfig::default())
    }
}

impl SampleQueue {
    /// Create a queue with the given configuration.
    pub fn new(config: QueueConfig) -> Self {
        Self {
            state: Mutex::new(QueueState {
                entries: Vec::new(),
                selected: None,
                low_water: None,
                next_seq: 0,
            }),
            config,
            metrics: Arc::new(SinkMetrics::new()),
        }
    }

    /// Insert a decoded sample in timestamp order.
    ///
    /// A non-cacheable sample discards any non-cacheable sample already
    /// pending, regardless of queue limits. A cacheable sample landing on
    /// an existing cacheable timestamp replaces it (latest write wins).
    /// Samples below the low-water-mark are soft-dropped.
    pub fn push(&self, sample: FrameSample) {
        let time = sample.time();
        let mut state = self.state.lock();

        if let Some(low_water) = state.low_water {
            if time < low_water {
                tracing::debug!(%time, %low_water, "late sample dropped");
                self.metrics.record_late_drop();
                return;
            }
        }
        self.metrics.record_push();

        if sample.is_cacheable() {
            // Latest write wins on an exact cacheable timestamp collision.
            if let Some(pos) = state
                .entries
                .iter()
                .position(|e| e.sample.is_cacheable() && e.sample.time() == time)
            {
                let removed = state.entries.remove(pos);
                if state.selected.map(|(_, seq)| seq) == Some(removed.seq) {
                    state.selected = None;
                }
            }
        } else {
            // At most one non-cacheable sample is ever pending.
            if let Some(pos) = state.entries.iter().position(|e| !e.sample.is_cacheable()) {
                let removed = state.entries.remove(pos);
                if state.selected.map(|(_, seq)| seq) == Some(removed.seq) {
                    state.selected = None;
                }
                self.metrics.record_non_cacheable_replaced();
            }
        }

        let seq = state.next_seq;
        state.next_seq += 1;
        let pos = state.entries.partition_point(|e| e.sample.time() <= time);
        state.entries.insert(
            pos,
            Entry {
                sample: Arc::new(sample),
                seq,
            },
        );

        if state.entries.len() > self.config.capacity {
            // Evict the oldest entry that is not currently on screen.
            let selected_seq = state.selected.map(|(_, seq)| seq);
            if let Some(pos) = state
                .entries
                .iter()
                .position(|e| Some(e.seq) != selected_seq)
            {
                let evicted = state.entries.remove(pos);
                tracing::warn!(time = %evicted.sample.time(), "queue over capacity, sample evicted");
                self.metrics.record_overflow_drop();
            }
        }
    }

    /// Select the sample to display for the given clock value.
    ///
    /// Picks the greatest timestamp `T <= clock` whose sample is still
    /// valid: within its duration, or, for zero-duration samples, not
    /// yet superseded by the next sample's timestamp. Equal timestamps
    /// resolve to the most recently pushed sample.
    ///
    /// Returns `None` when no sample is ready, which is a normal steady
    /// state while playback runs ahead of decode. Selecting advances the
    /// low-water-mark and releases every sample older than the selection.
    pub fn select_for_time(&self, clock: MediaTime) -> Option<Arc<FrameSample>> {
        let mut state = self.state.lock();

        let mut chosen: Option<usize> = None;
        for i in (0..state.entries.len()).rev() {
            let entry = &state.entries[i];
            let time = entry.sample.time();
            if time > clock {
                continue;
            }
            let duration = entry.sample.duration();
            let valid = if duration.is_zero() {
                // Valid until the next sample's timestamp.
                match state.entries.get(i + 1) {
                    Some(next) => clock < next.sample.time(),
                    None => true,
                }
            } else {
                clock < time + duration
            };
            if valid {
                chosen = Some(i);
                break;
            }
        }

        let Some(index) = chosen else {
            self.metrics.record_select(false);
            return None;
        };

        let time = state.entries[index].sample.time();
        let seq = state.entries[index].seq;
        let sample = Arc::clone(&state.entries[index].sample);

        // Everything older than the new selection is superseded:
        // non-cacheable samples unconditionally, cacheable ones as stale.
        if index > 0 {
            state.entries.drain(..index);
            self.metrics.record_stale_released(index as u64);
        }
        state.low_water = Some(time);
        state.selected = Some((time, seq));
        self.metrics.record_select(true);

        Some(sample)
    }

    /// Release all pending and selected samples and reset the
    /// low-water-mark, e.g. on seek.
    ///
    /// Consumers holding samples returned before the flush can keep
    /// reading them; samples are immutable and reference-counted.
    pub fn flush(&self) {
        let mut state = self.state.lock();
        let released = state.entries.len();
        state.entries.clear();
        state.selected = None;
        state.low_water = None;
        self.metrics.record_flush();
        tracing::debug!(released, "sample queue flushed");
    }

    /// Timestamp below which no future selection will succeed.
    pub fn low_water_mark(&self) -> Option<MediaTime> {
        self.state.lock().low_water
    }

    /// Number of samples currently held (pending or selected).
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Whether the queue holds no samples.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Timestamps currently held, in presentation order.
    pub fn pending_times(&self) -> Vec<MediaTime> {
        self.state
            .lock()
            .entries
            .iter()
            .map(|e| e.sample.time())
            .collect()
    }

    /// The queue's drop/selection counters.
    pub fn metrics(&self) -> Arc<SinkMetrics> {
        Arc::clone(&self.metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::PixelFormat;
    use bytes::Bytes;

    fn sample(time_ms: i64, duration_ms: i64, cacheable: bool) -> FrameSample {
        FrameSample::builder(PixelFormat::Bgra, MediaTime::from_millis(time_ms))
            .dim(2, 2)
            .buffer(Bytes::from(vec![0u8; 16]), 8)
            .duration(MediaTime::from_millis(duration_ms))
            .cacheable(cacheable)
            .build()
            .unwrap()
    }

    fn at(ms: i64) -> MediaTime {
        MediaTime::from_millis(ms)
    }

    #[test]
    fn selects_between_zero_duration_samples() {
        let queue = SampleQueue::default();
        queue.push(sample(0, 0, true));
        queue.push(sample(100, 0, true));
        queue.push(sample(200, 50, true));

        let selected = queue.select_for_time(at(150)).unwrap();
        assert_eq!(selected.time(), at(100));

        // The t=200 sample expired at 250 and the zero-duration samples
        // were superseded, so nothing is ready.
        assert!(queue.select_for_time(at(260)).is_none());
    }

    #[test]
    fn zero_duration_is_open_ended_without_successor() {
        let queue = SampleQueue::default();
        queue.push(sample(0, 0, true));
        assert_eq!(queue.select_for_time(at(10_000)).unwrap().time(), at(0));

        queue.push(sample(100, 0, true));
        assert_eq!(queue.select_for_time(at(10_000)).unwrap().time(), at(100));
    }

    #[test]
    fn selection_is_monotonic() {
        let queue = SampleQueue::default();
        for t in [0, 40, 80, 120] {
            queue.push(sample(t, 0, true));
        }

        let mut last = MediaTime::ZERO;
        for clock in [10, 50, 45, 90, 130] {
            if let Some(selected) = queue.select_for_time(at(clock)) {
                assert!(selected.time() >= last, "clock {clock}");
                last = selected.time();
            }
        }
    }

    #[test]
    fn not_ready_before_first_sample() {
        let queue = SampleQueue::default();
        queue.push(sample(100, 0, true));
        assert!(queue.select_for_time(at(50)).is_none());
        assert_eq!(queue.metrics().snapshot().selects_empty, 1);
    }

    #[test]
    fn non_cacheable_is_singleton() {
        let queue = SampleQueue::default();
        queue.push(sample(0, 0, true));
        queue.push(sample(50, 0, false));

        let selected = queue.select_for_time(at(60)).unwrap();
        assert_eq!(selected.time(), at(50));
        assert!(!selected.is_cacheable());

        // A newer non-cacheable push makes the t=50 sample unretrievable,
        // even via direct queue inspection.
        queue.push(sample(80, 0, false));
        assert!(!queue.pending_times().contains(&at(50)));
        assert_eq!(queue.metrics().snapshot().non_cacheable_replaced, 1);
        assert_eq!(queue.select_for_time(at(90)).unwrap().time(), at(80));
    }

    #[test]
    fn cacheable_timestamp_collision_latest_wins() {
        let queue = SampleQueue::default();
        queue.push(sample(100, 0, true));
        queue.push(sample(100, 25, true));

        assert_eq!(queue.len(), 1);
        let selected = queue.select_for_time(at(110)).unwrap();
        assert_eq!(selected.duration(), MediaTime::from_millis(25));
    }

    #[test]
    fn equal_timestamps_resolve_to_most_recent_push() {
        let queue = SampleQueue::default();
        queue.push(sample(100, 0, true));
        queue.push(sample(100, 0, false));
        assert_eq!(queue.len(), 2);

        let selected = queue.select_for_time(at(100)).unwrap();
        assert!(!selected.is_cacheable());
    }

    #[test]
    fn late_samples_are_soft_dropped() {
        let queue = SampleQueue::default();
        queue.push(sample(100, 0, true));
        assert_eq!(queue.select_for_time(at(120)).unwrap().time(), at(100));
        assert_eq!(queue.low_water_mark(), Some(at(100)));

        queue.push(sample(40, 0, true));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.metrics().snapshot().late_drops, 1);
        // Still showing the t=100 sample.
        assert_eq!(queue.select_for_time(at(120)).unwrap().time(), at(100));
    }

    #[test]
    fn selection_releases_older_samples() {
        let queue = SampleQueue::default();
        for t in [0, 40, 80] {
            queue.push(sample(t, 0, true));
        }
        assert_eq!(queue.select_for_time(at(85)).unwrap().time(), at(80));
        assert_eq!(queue.pending_times(), vec![at(80)]);
        assert_eq!(queue.metrics().snapshot().stale_released, 2);
    }

    #[test]
    fn flush_preserves_samples_held_by_consumers() {
        let queue = SampleQueue::default();
        queue.push(sample(0, 0, true));
        let held = queue.select_for_time(at(10)).unwrap();

        queue.flush();

        // The held reference reads unchanged after the flush.
        assert_eq!(held.time(), at(0));
        assert!(held.buffer().is_some());
        assert_eq!(held.format(), PixelFormat::Bgra);

        assert!(queue.is_empty());
        assert!(queue.low_water_mark().is_none());
        assert!(queue.select_for_time(at(10)).is_none());

        // The reset low-water-mark accepts earlier timestamps again.
        queue.push(sample(0, 0, true));
        assert_eq!(queue.select_for_time(at(5)).unwrap().time(), at(0));
    }

    #[test]
    fn capacity_overflow_evicts_oldest() {
        let queue = SampleQueue::new(QueueConfig { capacity: 2 });
        for t in [0, 40, 80] {
            queue.push(sample(t, 0, true));
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_times(), vec![at(40), at(80)]);
        assert_eq!(queue.metrics().snapshot().overflow_drops, 1);
    }

    #[test]
    fn producer_and_consumer_threads() {
        let queue = Arc::new(SampleQueue::new(QueueConfig { capacity: 256 }));

        let producer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                for i in 0..100 {
                    queue.push(sample(i * 10, 0, true));
                }
            })
        };
        let consumer = {
            let queue = Arc::clone(&queue);
            std::thread::spawn(move || {
                let mut last = MediaTime::ZERO;
                for i in 0..100 {
                    if let Some(selected) = queue.select_for_time(at(i * 10)) {
                        assert!(selected.time() >= last);
                        last = selected.time();
                    }
                }
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();

        assert_eq!(queue.metrics().snapshot().pushed, 100);
        assert_eq!(queue.select_for_time(at(10_000)).unwrap().time(), at(990));
    }
}
