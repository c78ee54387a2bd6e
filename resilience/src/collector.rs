/// The inputs a Hystrix-style reporter composes into a uniform snapshot.
///
/// This crate does not build the reporter itself — only its top-level shape
/// is out of scope — but every primitive that owns rolling and cumulative
/// counters implements this so a caller-supplied reporter can iterate a
/// named set of collectors into one `HashMap<String, i64>`-shaped map. Every
/// value yielded here is integer-valued, as the external interface requires.
pub trait Collector {
    /// A stable name for this collector, used by the reporter as a key
    /// prefix (e.g. `"orders-service-breaker"`).
    fn name(&self) -> &str;

    /// Counters reset by `reset()` on the underlying rolling window(s).
    fn rolling_counters(&self) -> Vec<(&'static str, i64)>;

    /// Monotonic counters that survive `reset()`.
    fn cumulative_counters(&self) -> Vec<(&'static str, i64)>;
}
