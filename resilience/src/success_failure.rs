use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use resilience_core::{BucketKind, Clock, RollingCount, RollingWindow};

use crate::collector::Collector;
use crate::error::ResilienceResult;

/// Records the terminal outcome (ok/err) of a guarded call.
///
/// Both success and failure are tracked as rolling counts, for windowed
/// readers such as [`crate::FaultDetector`], and as monotonic cumulative
/// counters independent of the window, for long-lived dashboards. A
/// `SuccessFailureTracker` never swallows the wrapped call's error: `call`
/// records and then returns the `Result` unchanged.
pub struct SuccessFailureTracker {
    name: String,
    success: RollingWindow,
    failure: RollingWindow,
    cumulative_success: AtomicI64,
    cumulative_failure: AtomicI64,
}

impl SuccessFailureTracker {
    pub fn new(
        name: impl Into<String>,
        n: usize,
        window_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<Self> {
        Ok(Self {
            name: name.into(),
            success: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            failure: RollingWindow::new(BucketKind::Counting, n, window_ms, clock)?,
            cumulative_success: AtomicI64::new(0),
            cumulative_failure: AtomicI64::new(0),
        })
    }

    pub fn record_success(&self) {
        self.success.record(1);
        self.cumulative_success.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failure.record(1);
        self.cumulative_failure.fetch_add(1, Ordering::Relaxed);
    }

    /// Wraps `f`, recording success on `Ok` and failure on `Err`, then
    /// re-raising the error unchanged.
    pub fn call<F, T, E>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        match f() {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    /// The rolling success/failure counts observed in the current window.
    pub fn rolling_success_and_failure(&self) -> (i64, i64) {
        let success: i64 = self.success.get_all_elements().iter().sum();
        let failure: i64 = self.failure.get_all_elements().iter().sum();
        (success, failure)
    }

    pub fn reset(&self) {
        self.success.reset();
        self.failure.reset();
    }
}

impl Collector for SuccessFailureTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn rolling_counters(&self) -> Vec<(&'static str, i64)> {
        let (success, failure) = self.rolling_success_and_failure();
        vec![("success", success), ("failure", failure)]
    }

    fn cumulative_counters(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("cumulative_success", self.cumulative_success.load(Ordering::Relaxed)),
            ("cumulative_failure", self.cumulative_failure.load(Ordering::Relaxed)),
        ]
    }
}
