use std::sync::Arc;

use resilience_core::{BucketKind, Clock, RollingCount, RollingWindow};

use crate::collector::Collector;
use crate::error::ResilienceResult;

/// A point-in-time view of everything a [`LatencyTracker`] has observed in
/// its rolling window: count, sum, min, and max, all in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleMetrics {
    pub count: i64,
    pub sum_millis: i64,
    pub min_millis: i64,
    pub max_millis: i64,
}

/// Records the latency of a timed call into a summarizing rolling window.
///
/// Four rolling collectors of different [`BucketKind`]s stand in for one
/// quantile sketch: count (`Counting`), sum (`Summing`), max (`Max`), and min
/// (`Max` over negated durations, negated back on read). This toolkit has no
/// use for quantiles, only count/sum/min/max, so a dedicated sketch
/// dependency is unwarranted here.
///
/// A `LatencyTracker` never alters the caller's result or error propagation:
/// [`LatencyTracker::time`] and [`LatencyTracker::time_result`] both record
/// the elapsed duration and then return exactly what the wrapped call
/// returned.
pub struct LatencyTracker {
    name: String,
    clock: Arc<dyn Clock>,
    count: RollingWindow,
    sum: RollingWindow,
    max: RollingWindow,
    neg_min: RollingWindow,
    total_samples: std::sync::atomic::AtomicI64,
}

impl LatencyTracker {
    /// Creates a tracker with `n` buckets spanning `window_ms` milliseconds.
    pub fn new(
        name: impl Into<String>,
        n: usize,
        window_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<Self> {
        Ok(Self {
            name: name.into(),
            count: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            sum: RollingWindow::new(BucketKind::Summing, n, window_ms, clock.clone())?,
            max: RollingWindow::new(BucketKind::Max, n, window_ms, clock.clone())?,
            neg_min: RollingWindow::new(BucketKind::Max, n, window_ms, clock.clone())?,
            clock,
            total_samples: std::sync::atomic::AtomicI64::new(0),
        })
    }

    /// Records an already-measured duration, in milliseconds.
    pub fn record_millis(&self, millis: i64) {
        self.count.record(1);
        self.sum.record(millis);
        self.max.record(millis);
        self.neg_min.record(-millis);
        self.total_samples.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    /// Times `f`, recording its duration, and returns its result unchanged.
    pub fn time<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let start = self.clock.now_millis();
        let result = f();
        self.record_millis(self.clock.now_millis() - start);
        result
    }

    /// As [`LatencyTracker::time`], for a fallible call. The error is never
    /// swallowed: it is returned exactly as the caller's `f` produced it,
    /// after the duration has been recorded regardless of outcome.
    pub fn time_result<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let start = self.clock.now_millis();
        let result = f();
        self.record_millis(self.clock.now_millis() - start);
        result
    }

    /// Aggregates the current rolling window into count/sum/min/max.
    ///
    /// Both `max` and `neg_min` buckets rest at `i64::MIN` when untouched
    /// (see `BucketStore::floor_value`), so a window with no samples would
    /// otherwise report `max_millis`/`min_millis` as a huge negative number
    /// instead of `0`; that sentinel is mapped back to `0` here.
    pub fn sample_metrics(&self) -> SampleMetrics {
        let count: i64 = self.count.get_all_elements().iter().sum();
        let sum_millis: i64 = self.sum.get_all_elements().iter().sum();
        let max_raw = self.max.get_all_elements().into_iter().max().unwrap_or(i64::MIN);
        let max_millis = if max_raw == i64::MIN { 0 } else { max_raw };
        let neg_min = self.neg_min.get_all_elements().into_iter().max().unwrap_or(i64::MIN);
        let min_millis = if neg_min == i64::MIN { 0 } else { -neg_min };
        SampleMetrics { count, sum_millis, min_millis, max_millis }
    }

    /// Clears all rolling buckets; cumulative sample count survives.
    pub fn reset(&self) {
        self.count.reset();
        self.sum.reset();
        self.max.reset();
        self.neg_min.reset();
    }
}

impl Collector for LatencyTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn rolling_counters(&self) -> Vec<(&'static str, i64)> {
        let metrics = self.sample_metrics();
        vec![
            ("latency.count", metrics.count),
            ("latency.sum_millis", metrics.sum_millis),
            ("latency.min_millis", metrics.min_millis),
            ("latency.max_millis", metrics.max_millis),
        ]
    }

    fn cumulative_counters(&self) -> Vec<(&'static str, i64)> {
        vec![(
            "latency.total_samples",
            self.total_samples.load(std::sync::atomic::Ordering::Relaxed),
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_core::ManualClock;

    fn tracker(n: usize, window_ms: i64, clock: Arc<ManualClock>) -> LatencyTracker {
        LatencyTracker::new("test", n, window_ms, clock as Arc<dyn Clock>).unwrap()
    }

    #[test]
    fn time_does_not_alter_the_wrapped_result() {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(4, 4000, clock.clone());
        let value = tracker.time(|| {
            clock.advance(50);
            42
        });
        assert_eq!(value, 42);
        assert_eq!(tracker.sample_metrics().count, 1);
        assert_eq!(tracker.sample_metrics().sum_millis, 50);
    }

    #[test]
    fn time_result_propagates_errors_after_recording() {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(4, 4000, clock.clone());
        let result: Result<(), &str> = tracker.time_result(|| {
            clock.advance(10);
            Err("boom")
        });
        assert_eq!(result, Err("boom"));
        assert_eq!(tracker.sample_metrics().count, 1);
    }

    #[test]
    fn sample_metrics_tracks_count_sum_min_max() {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(4, 4000, clock.clone());
        for d in [10, 50, 5, 30] {
            tracker.record_millis(d);
        }
        let metrics = tracker.sample_metrics();
        assert_eq!(metrics.count, 4);
        assert_eq!(metrics.sum_millis, 95);
        assert_eq!(metrics.min_millis, 5);
        assert_eq!(metrics.max_millis, 50);
    }

    #[test]
    fn sample_metrics_on_a_fresh_tracker_reports_zero_not_the_max_sentinel() {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(4, 4000, clock);
        let metrics = tracker.sample_metrics();
        assert_eq!(metrics, SampleMetrics::default());
    }

    #[test]
    fn reset_clears_rolling_but_not_cumulative_total() {
        let clock = Arc::new(ManualClock::new(0));
        let tracker = tracker(4, 4000, clock.clone());
        tracker.record_millis(10);
        tracker.record_millis(20);
        tracker.reset();
        assert_eq!(tracker.sample_metrics().count, 0);
        assert_eq!(
            tracker.cumulative_counters(),
            vec![("latency.total_samples", 2)]
        );
    }
}
