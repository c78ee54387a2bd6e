use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of monotonic milliseconds, injected into every rolling structure
/// so that tests can drive time deterministically instead of sleeping.
///
/// All time-reading in this crate goes through a `Clock` — nothing calls
/// `SystemTime::now()` or `Instant::now()` directly outside of
/// [`SystemClock`]'s own construction.
pub trait Clock: Send + Sync {
    /// The current time, in milliseconds, on whatever timeline this clock
    /// uses. Only differences between two calls on the *same* clock are
    /// meaningful; the absolute value carries no cross-clock guarantee.
    fn now_millis(&self) -> i64;
}

/// The production [`Clock`], backed by [`quanta::Clock`] for a cheap
/// monotonic read, anchored to wall-clock milliseconds at construction time.
#[derive(Clone)]
pub struct SystemClock {
    clock: quanta::Clock,
    epoch_instant: quanta::Instant,
    epoch_millis: i64,
}

impl SystemClock {
    /// Creates a new [`SystemClock`], anchoring `quanta`'s monotonic instant
    /// to the current wall-clock time.
    pub fn new() -> Self {
        let clock = quanta::Clock::new();
        let epoch_instant = clock.now();
        let epoch_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Self { clock, epoch_instant, epoch_millis }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        let elapsed = self.clock.now().saturating_duration_since(self.epoch_instant);
        self.epoch_millis.saturating_add(elapsed.as_millis() as i64)
    }
}

/// A [`Clock`] whose value is set entirely by the test driving it.
///
/// Used throughout this workspace's tests in place of `SystemClock` so that
/// rotation boundaries, cooldowns, and timeouts can be exercised without
/// sleeping, the same role `quanta::Clock` injection plays for the teacher's
/// `Recency` type.
#[derive(Debug, Default)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    /// Creates a [`ManualClock`] starting at `start_millis`.
    pub fn new(start_millis: i64) -> Self {
        Self { millis: AtomicI64::new(start_millis) }
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Advances the clock by `delta_millis` (may be negative, to exercise
    /// the "backward clock" edge case).
    pub fn advance(&self, delta_millis: i64) {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_advances_and_sets() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now_millis(), 1_000);
        clock.advance(500);
        assert_eq!(clock.now_millis(), 1_500);
        clock.set(0);
        assert_eq!(clock.now_millis(), 0);
        clock.advance(-100);
        assert_eq!(clock.now_millis(), -100);
    }

    #[test]
    fn system_clock_is_monotonic_and_nondecreasing() {
        let clock = SystemClock::new();
        let a = clock.now_millis();
        let b = clock.now_millis();
        assert!(b >= a);
    }
}
