//! Rolling time-window metrics engine.
//!
//! This crate holds the hard, shared core of the resilience toolkit: a
//! fixed-capacity atomic bucket store and the time-bucketed rolling window
//! built on top of it. Everything here is lock-light — atomic cells for
//! per-bucket updates, a short critical section only for rotation — and
//! accepts high-frequency concurrent writers while a reader observes a
//! windowed, per-cell-consistent (not globally atomic) view.
//!
//! Higher-level primitives (circuit breaker, semaphore, thread pool, ...)
//! live in the `resilience` crate and are built entirely on the types
//! exported here.

mod bucket;
mod clock;
mod error;
mod window;

pub use bucket::{BucketKind, BucketStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{CoreError, CoreResult};
pub use window::{RollingCount, RollingWindow};
