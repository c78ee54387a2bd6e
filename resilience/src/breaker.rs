use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use resilience_core::{BucketKind, Clock, RollingCount, RollingWindow};

use crate::collector::Collector;
use crate::error::{RejectionGate, ResilienceError, ResilienceResult, WindowCounters};
use crate::fault_detector::{FaultDetector, Health};
use crate::half_open::HalfOpenRetryResolver;
use crate::semaphore::{CountingSemaphore, Permit};
use crate::success_failure::SuccessFailureTracker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

enum Admission<'a> {
    Normal,
    Probe(Permit<'a>),
}

/// State machine coordinating a [`FaultDetector`] and a
/// [`HalfOpenRetryResolver`] over a shared [`SuccessFailureTracker`].
///
/// `Closed` admits every call and watches the detector; the first
/// `unhealthy` reading trips it to `Open`, recording when the trip
/// happened. While `Open`, admissions are rejected until the cooldown
/// elapses, at which point exactly one concurrent admission becomes the
/// `HalfOpen` probe (enforced by an internal single-permit gate — a
/// [`CountingSemaphore`] of capacity one, reused rather than hand-rolled).
/// The probe's own outcome decides whether the breaker closes again or
/// reopens.
pub struct CircuitBreaker {
    name: String,
    clock: Arc<dyn Clock>,
    tracker: SuccessFailureTracker,
    detector: FaultDetector,
    resolver: HalfOpenRetryResolver,
    probe_gate: CountingSemaphore,
    state: Mutex<(State, i64)>,
    short_circuited: RollingWindow,
    cumulative_short_circuited: AtomicI64,
}

impl CircuitBreaker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        n: usize,
        window_ms: i64,
        minimum_samples: i64,
        failure_ratio_threshold: f64,
        cooldown_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<Self> {
        let name = name.into();
        Ok(Self {
            tracker: SuccessFailureTracker::new(name.clone(), n, window_ms, clock.clone())?,
            detector: FaultDetector::new(minimum_samples, failure_ratio_threshold)?,
            resolver: HalfOpenRetryResolver::new(cooldown_ms, clock.clone())?,
            probe_gate: CountingSemaphore::new(format!("{name}.probe_gate"), 1, n, window_ms, clock.clone())?,
            short_circuited: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            cumulative_short_circuited: AtomicI64::new(0),
            state: Mutex::new((State::Closed, 0)),
            clock,
            name,
        })
    }

    /// Admits or rejects the call, then — if admitted — invokes `f`,
    /// recording its outcome into the underlying success/failure tracker
    /// and, for a probe, deciding the next breaker transition. `f`'s error
    /// is never swallowed: it is re-surfaced as
    /// [`ResilienceError::UserError`].
    pub fn call<F, T, E>(&self, f: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        match self.admit()? {
            Admission::Normal => self
                .tracker
                .call(f)
                .map_err(|e| ResilienceError::UserError(Box::new(e))),
            Admission::Probe(permit) => {
                let result = self.tracker.call(f);
                match &result {
                    Ok(_) => self.on_probe_success(),
                    Err(_) => self.on_probe_failure(),
                }
                drop(permit);
                result.map_err(|e| ResilienceError::UserError(Box::new(e)))
            }
        }
    }

    fn admit(&self) -> Result<Admission<'_>, ResilienceError> {
        let mut guard = self.state.lock();
        match guard.0 {
            State::Closed => match self.detector.check(&self.tracker) {
                Health::Healthy => Ok(Admission::Normal),
                Health::Unhealthy => {
                    let now = self.clock.now_millis();
                    guard.0 = State::Open;
                    guard.1 = now;
                    drop(guard);
                    tracing::info!(breaker = %self.name, "Closed -> Open (fault detector unhealthy)");
                    Err(self.reject())
                }
            },
            State::Open => {
                let opened_at = guard.1;
                if self.resolver.should_probe(opened_at) {
                    guard.0 = State::HalfOpen;
                    drop(guard);
                    tracing::info!(breaker = %self.name, "Open -> HalfOpen (cooldown elapsed)");
                    match self.probe_gate.try_acquire() {
                        Ok(permit) => Ok(Admission::Probe(permit)),
                        Err(_) => Err(self.reject()),
                    }
                } else {
                    drop(guard);
                    Err(self.reject())
                }
            }
            State::HalfOpen => {
                drop(guard);
                match self.probe_gate.try_acquire() {
                    Ok(permit) => Ok(Admission::Probe(permit)),
                    Err(_) => Err(self.reject()),
                }
            }
        }
    }

    fn on_probe_success(&self) {
        let mut guard = self.state.lock();
        *guard = (State::Closed, 0);
        drop(guard);
        // A fresh rolling window avoids re-tripping instantly on stale
        // failures that predate the probe.
        self.tracker.reset();
        tracing::info!(breaker = %self.name, "HalfOpen -> Closed (probe succeeded)");
    }

    fn on_probe_failure(&self) {
        let now = self.clock.now_millis();
        let mut guard = self.state.lock();
        *guard = (State::Open, now);
        drop(guard);
        tracing::info!(breaker = %self.name, "HalfOpen -> Open (probe failed)");
    }

    fn reject(&self) -> ResilienceError {
        self.short_circuited.record(1);
        self.cumulative_short_circuited.fetch_add(1, Ordering::Relaxed);
        ResilienceError::Rejected {
            gate: RejectionGate::CircuitBreaker,
            counters: WindowCounters {
                rolling_rejected: self.short_circuited.get_all_elements().iter().sum(),
                cumulative_rejected: self.cumulative_short_circuited.load(Ordering::Relaxed),
            },
        }
    }

    /// `true` while the breaker is Open or HalfOpen.
    pub fn is_open(&self) -> bool {
        !matches!(self.state.lock().0, State::Closed)
    }
}

impl Collector for CircuitBreaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn rolling_counters(&self) -> Vec<(&'static str, i64)> {
        let mut counters = vec![(
            "breaker.short_circuited",
            self.short_circuited.get_all_elements().iter().sum(),
        )];
        counters.extend(self.tracker.rolling_counters());
        counters
    }

    fn cumulative_counters(&self) -> Vec<(&'static str, i64)> {
        let mut counters = vec![(
            "breaker.cumulative_short_circuited",
            self.cumulative_short_circuited.load(Ordering::Relaxed),
        )];
        counters.extend(self.tracker.cumulative_counters());
        counters
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_core::ManualClock;

    fn breaker(clock: Arc<ManualClock>) -> CircuitBreaker {
        CircuitBreaker::new("test", 4, 4000, 5, 0.5, 1000, clock as Arc<dyn Clock>).unwrap()
    }

    fn ok_call() -> Result<(), std::io::Error> {
        Ok(())
    }

    fn err_call() -> Result<(), std::io::Error> {
        Err(std::io::Error::new(std::io::ErrorKind::Other, "boom"))
    }

    // Scenario S3: threshold 50%, M=5; five successes then five failures,
    // then the next admission is rejected and the short-circuited counter
    // reads 1.
    #[test]
    fn s3_breaker_trips_after_failure_ratio_crosses_threshold() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock);
        for _ in 0..5 {
            breaker.call(ok_call).unwrap();
        }
        for _ in 0..5 {
            assert!(breaker.call(err_call).is_err());
        }
        let result = breaker.call(ok_call);
        assert!(matches!(
            result,
            Err(ResilienceError::Rejected { gate: RejectionGate::CircuitBreaker, .. })
        ));
        assert_eq!(
            breaker
                .rolling_counters()
                .iter()
                .find(|(k, _)| *k == "breaker.short_circuited")
                .unwrap()
                .1,
            1
        );
        assert!(breaker.is_open());
    }

    // Scenario S4: after open + cooldown, of 10 concurrent admissions
    // exactly one is admitted (the probe) and the other 9 are rejected.
    #[test]
    fn s4_half_open_admits_exactly_one_probe() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..5 {
            breaker.call(ok_call).unwrap();
        }
        for _ in 0..5 {
            let _ = breaker.call(err_call);
        }
        assert!(breaker.is_open());
        clock.advance(1000);

        let mut admitted = 0;
        let mut rejected = 0;
        for _ in 0..10 {
            match breaker.call(ok_call) {
                Ok(()) => admitted += 1,
                Err(ResilienceError::Rejected { .. }) => rejected += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(admitted, 1);
        assert_eq!(rejected, 9);
    }

    #[test]
    fn successful_probe_closes_the_breaker() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..5 {
            breaker.call(ok_call).unwrap();
        }
        for _ in 0..5 {
            let _ = breaker.call(err_call);
        }
        clock.advance(1000);
        breaker.call(ok_call).unwrap();
        assert!(!breaker.is_open());
    }

    #[test]
    fn failed_probe_reopens_and_refreshes_opened_at() {
        let clock = Arc::new(ManualClock::new(0));
        let breaker = breaker(clock.clone());
        for _ in 0..5 {
            breaker.call(ok_call).unwrap();
        }
        for _ in 0..5 {
            let _ = breaker.call(err_call);
        }
        clock.advance(1000);
        let _ = breaker.call(err_call);
        assert!(breaker.is_open());

        // Cooldown has not elapsed relative to the refreshed opened_at.
        clock.advance(500);
        assert!(matches!(
            breaker.call(ok_call),
            Err(ResilienceError::Rejected { .. })
        ));
    }
}
