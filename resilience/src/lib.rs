//! Resilience primitives built on top of `resilience-core`'s rolling
//! metrics engine: latency and success/failure tracking, a bounded
//! semaphore, a bounded thread pool, and a circuit breaker coordinating a
//! rolling fault detector with a half-open retry resolver.
//!
//! The caller-facing wrapper that chains these primitives around a unit of
//! work, and the concrete shape of a metrics reporter, are out of scope —
//! this crate provides the [`Collector`] trait as the reporter's only
//! input-side contract.

mod breaker;
mod collector;
mod config;
mod error;
mod fault_detector;
mod half_open;
mod latency;
mod semaphore;
mod success_failure;
mod thread_pool;

pub use breaker::CircuitBreaker;
pub use collector::Collector;
pub use config::{
    BoundedThreadPoolConfig, CircuitBreakerConfig, CountingSemaphoreConfig, FaultDetectorConfig,
    RollingWindowConfig,
};
pub use error::{RejectionGate, ResilienceError, ResilienceResult, WindowCounters};
pub use fault_detector::{FaultDetector, Health};
pub use half_open::HalfOpenRetryResolver;
pub use latency::{LatencyTracker, SampleMetrics};
pub use semaphore::{CountingSemaphore, Permit};
pub use success_failure::SuccessFailureTracker;
pub use thread_pool::BoundedThreadPool;
