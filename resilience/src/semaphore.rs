use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use resilience_core::{BucketKind, Clock, RollingCount, RollingWindow};

use crate::collector::Collector;
use crate::error::{RejectionGate, ResilienceError, ResilienceResult, WindowCounters};

/// A bounded, non-blocking counting semaphore.
///
/// `try_acquire` never blocks: it either wins a permit or is rejected
/// immediately. There is no queueing and no fairness guarantee between
/// concurrent callers.
pub struct CountingSemaphore {
    name: String,
    capacity: i64,
    available: AtomicI64,
    rejected: RollingWindow,
    cumulative_rejected: AtomicI64,
}

/// A permit held against a [`CountingSemaphore`]. Dropping it releases the
/// permit back to the semaphore it came from.
#[must_use = "a dropped permit immediately releases back to the semaphore"]
pub struct Permit<'a> {
    semaphore: &'a CountingSemaphore,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}

impl CountingSemaphore {
    pub fn new(
        name: impl Into<String>,
        capacity: i64,
        n: usize,
        window_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<Self> {
        if capacity < 0 {
            return Err(ResilienceError::InvalidArgument {
                message: "semaphore capacity must be non-negative".to_string(),
            });
        }
        Ok(Self {
            name: name.into(),
            capacity,
            available: AtomicI64::new(capacity),
            rejected: RollingWindow::new(BucketKind::Counting, n, window_ms, clock)?,
            cumulative_rejected: AtomicI64::new(0),
        })
    }

    /// Attempts to acquire a permit without blocking.
    pub fn try_acquire(&self) -> ResilienceResult<Permit<'_>> {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current <= 0 {
                self.record_rejection();
                return Err(self.rejected_error());
            }
            match self.available.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(Permit { semaphore: self }),
                Err(actual) => current = actual,
            }
        }
    }

    fn release(&self) {
        let mut current = self.available.load(Ordering::Acquire);
        loop {
            if current >= self.capacity {
                // Conservation invariant guards against a stray double-release.
                return;
            }
            match self.available.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }

    fn record_rejection(&self) {
        self.rejected.record(1);
        self.cumulative_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(semaphore = %self.name, "rejected: no permits available");
    }

    fn rejected_error(&self) -> ResilienceError {
        ResilienceError::Rejected {
            gate: RejectionGate::Semaphore,
            counters: WindowCounters {
                rolling_rejected: self.rolling_rejected(),
                cumulative_rejected: self.cumulative_rejected.load(Ordering::Relaxed),
            },
        }
    }

    /// Currently available permits.
    pub fn available(&self) -> i64 {
        self.available.load(Ordering::Acquire)
    }

    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    pub fn rolling_rejected(&self) -> i64 {
        self.rejected.get_all_elements().iter().sum()
    }

    pub fn reset(&self) {
        self.rejected.reset();
    }
}

impl Collector for CountingSemaphore {
    fn name(&self) -> &str {
        &self.name
    }

    fn rolling_counters(&self) -> Vec<(&'static str, i64)> {
        vec![("semaphore.rejected", self.rolling_rejected())]
    }

    fn cumulative_counters(&self) -> Vec<(&'static str, i64)> {
        vec![(
            "semaphore.cumulative_rejected",
            self.cumulative_rejected.load(Ordering::Relaxed),
        )]
    }
}
