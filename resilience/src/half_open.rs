use std::sync::Arc;

use resilience_core::Clock;

/// Decides whether an open breaker's cooldown has elapsed.
///
/// This resolver only answers "is it time to probe?" — it does not track
/// whether a probe is currently inflight or how it turned out. That
/// bookkeeping belongs to [`crate::CircuitBreaker`], which owns the
/// single-permit gate enforcing "exactly one probe".
pub struct HalfOpenRetryResolver {
    cooldown_ms: i64,
    clock: Arc<dyn Clock>,
}

impl HalfOpenRetryResolver {
    pub fn new(cooldown_ms: i64, clock: Arc<dyn Clock>) -> crate::ResilienceResult<Self> {
        if cooldown_ms < 0 {
            return Err(crate::ResilienceError::InvalidArgument {
                message: "cooldown_ms must be non-negative".to_string(),
            });
        }
        Ok(Self { cooldown_ms, clock })
    }

    /// `true` once at least `cooldown_ms` has elapsed since `opened_at`.
    pub fn should_probe(&self, opened_at: i64) -> bool {
        self.clock.now_millis() - opened_at >= self.cooldown_ms
    }
}
