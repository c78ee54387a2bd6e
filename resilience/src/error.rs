use std::time::Duration;

use thiserror::Error;

/// Which gate refused admission, carried on [`ResilienceError::Rejected`] so
/// callers can distinguish overload from application failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionGate {
    /// A [`crate::CountingSemaphore`] had no permits available.
    Semaphore,
    /// A [`crate::BoundedThreadPool`]'s queue was full.
    ThreadPoolQueue,
    /// A [`crate::CircuitBreaker`] was open, or was in `HalfOpen` and a
    /// probe was already inflight.
    CircuitBreaker,
}

/// The rolling and cumulative counters a gate had observed at the moment it
/// rejected a call, attached to [`ResilienceError::Rejected`] for
/// diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowCounters {
    pub rolling_rejected: i64,
    pub cumulative_rejected: i64,
}

/// Errors surfaced by the resilience primitives.
///
/// `Rejected` and `Timeout` originate inside the primitives; `UserError`
/// re-surfaces the caller's own error unchanged after metrics have been
/// recorded — it is never constructed by this crate for its own failures.
#[derive(Debug, Error)]
pub enum ResilienceError {
    /// A constructor was called with out-of-range parameters.
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A gate refused admission without invoking the underlying call.
    #[error("rejected by {gate:?}: {counters:?}")]
    Rejected { gate: RejectionGate, counters: WindowCounters },

    /// A bounded thread pool task did not complete within its deadline.
    #[error("task timed out after {after:?}")]
    Timeout { after: Duration },

    /// The caller's own unit of work failed; recorded, then rethrown
    /// unchanged.
    #[error(transparent)]
    UserError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl From<resilience_core::CoreError> for ResilienceError {
    fn from(err: resilience_core::CoreError) -> Self {
        match err {
            resilience_core::CoreError::InvalidArgument { message } => {
                ResilienceError::InvalidArgument { message }
            }
        }
    }
}

/// Convenience alias for this crate's fallible operations.
pub type ResilienceResult<T> = Result<T, ResilienceError>;
