//! Plain configuration structs for every primitive in this crate.
//!
//! Each `Config` is a caller-assembled value, not a builder: there is no
//! fluent API, no file or environment parsing (out of scope, see
//! `SPEC_FULL.md`). Validation happens once, in `build()`, which simply
//! forwards to the primitive's own validated constructor so the rules live
//! in exactly one place.

use std::sync::Arc;
use std::time::Duration;

use resilience_core::Clock;

use crate::breaker::CircuitBreaker;
use crate::error::ResilienceResult;
use crate::semaphore::CountingSemaphore;
use crate::thread_pool::BoundedThreadPool;

/// Shared rolling-window sizing: `n` buckets spanning `window_ms`
/// milliseconds (`window_ms % n == 0`).
#[derive(Debug, Clone, Copy)]
pub struct RollingWindowConfig {
    pub n: usize,
    pub window_ms: i64,
}

impl RollingWindowConfig {
    pub fn new(n: usize, window_ms: i64) -> Self {
        Self { n, window_ms }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CountingSemaphoreConfig {
    pub capacity: i64,
    pub window: RollingWindowConfig,
}

impl CountingSemaphoreConfig {
    pub fn build(
        self,
        name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<CountingSemaphore> {
        CountingSemaphore::new(name, self.capacity, self.window.n, self.window.window_ms, clock)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoundedThreadPoolConfig {
    pub workers: usize,
    pub queue_capacity: usize,
    pub window: RollingWindowConfig,
}

impl BoundedThreadPoolConfig {
    pub fn build(
        self,
        name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<BoundedThreadPool> {
        BoundedThreadPool::new(
            name,
            self.workers,
            self.queue_capacity,
            self.window.n,
            self.window.window_ms,
            clock,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FaultDetectorConfig {
    pub minimum_samples: i64,
    pub failure_ratio_threshold: f64,
}

impl FaultDetectorConfig {
    pub fn build(self) -> ResilienceResult<crate::fault_detector::FaultDetector> {
        crate::fault_detector::FaultDetector::new(self.minimum_samples, self.failure_ratio_threshold)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub window: RollingWindowConfig,
    pub fault_detector: FaultDetectorConfig,
    pub cooldown: Duration,
}

impl CircuitBreakerConfig {
    pub fn build(
        self,
        name: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<CircuitBreaker> {
        CircuitBreaker::new(
            name,
            self.window.n,
            self.window.window_ms,
            self.fault_detector.minimum_samples,
            self.fault_detector.failure_ratio_threshold,
            self.cooldown.as_millis() as i64,
            clock,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resilience_core::ManualClock;

    #[test]
    fn semaphore_config_builds_a_working_semaphore() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let config = CountingSemaphoreConfig { capacity: 2, window: RollingWindowConfig::new(4, 4000) };
        let sem = config.build("test", clock).unwrap();
        assert_eq!(sem.capacity(), 2);
    }

    #[test]
    fn breaker_config_builds_a_working_breaker() {
        let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(0));
        let config = CircuitBreakerConfig {
            window: RollingWindowConfig::new(4, 4000),
            fault_detector: FaultDetectorConfig { minimum_samples: 5, failure_ratio_threshold: 0.5 },
            cooldown: Duration::from_secs(1),
        };
        let breaker = config.build("test", clock).unwrap();
        assert!(!breaker.is_open());
    }
}
