use std::sync::atomic::{AtomicI64, Ordering};

use crate::error::{CoreError, CoreResult};

/// The aggregation rule governing how a [`BucketStore`]'s cells are updated
/// by `record` and combined by `reduce`.
///
/// A capability set (`record`, `reduce`, `snapshot`, `reset`) is shared across
/// all three variants; the variant only changes what `record` and `reduce`
/// *do*, so we dispatch on a tag rather than growing a trait-object
/// hierarchy for three concrete shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketKind {
    /// `record` ignores its value and increments by one; `reduce` sums.
    Counting,
    /// `record` adds its value; `reduce` sums.
    Summing,
    /// `record` raises the cell to `max(prev, value)`; `reduce` takes the
    /// element-wise maximum.
    Max,
}

/// A fixed-length, atomically-updatable sequence of cells sharing one
/// [`BucketKind`].
///
/// Every cell is independently updatable under atomic discipline; there is
/// no global lock, so `snapshot()` is not linearizable across cells — a
/// reader may observe a mix of old and new values across different indices.
/// This is intentional: rolling metrics tolerate that jitter, and a global
/// barrier to avoid it would be prohibitively expensive on the hot path.
#[derive(Debug)]
pub struct BucketStore {
    kind: BucketKind,
    cells: Vec<AtomicI64>,
}

impl BucketStore {
    /// Creates a new store of `len` cells, each initialized to this store's
    /// floor value (`0` for counting/summing, `i64::MIN` for max — see
    /// [`BucketStore::identity`]).
    pub fn new(kind: BucketKind, len: usize) -> CoreResult<Self> {
        if len == 0 {
            return Err(CoreError::InvalidArgument {
                message: "bucket store length must be greater than zero".to_string(),
            });
        }
        let floor = Self::floor_value(kind);
        let cells = (0..len).map(|_| AtomicI64::new(floor)).collect();
        Ok(Self { kind, cells })
    }

    /// The fixed cell count `N`, stable for the life of the store.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Never true after a successful [`BucketStore::new`].
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn kind(&self) -> BucketKind {
        self.kind
    }

    /// Applies this store's update rule at `index`. Panics if `index >= len`;
    /// callers (namely [`crate::window::RollingWindow`]) are responsible for
    /// keeping indices in range.
    pub fn record(&self, index: usize, value: i64) {
        let cell = &self.cells[index];
        match self.kind {
            BucketKind::Counting => {
                cell.fetch_add(1, Ordering::AcqRel);
            }
            BucketKind::Summing => {
                cell.fetch_add(value, Ordering::AcqRel);
            }
            BucketKind::Max => {
                let mut prev = cell.load(Ordering::Acquire);
                while value > prev {
                    match cell.compare_exchange_weak(
                        prev,
                        value,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => break,
                        Err(actual) => prev = actual,
                    }
                }
            }
        }
    }

    /// Resets a single cell to this store's floor value. Used by rotation to
    /// clear buckets crossed during an epoch advance.
    pub fn clear(&self, index: usize) {
        self.cells[index].store(Self::floor_value(self.kind), Ordering::Release);
    }

    /// Copies every cell's current value into a fresh `Vec`. Each cell is
    /// read with its own atomic load; there is no cross-cell barrier.
    pub fn snapshot(&self) -> Vec<i64> {
        self.cells.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }

    /// Resets every cell to this store's floor value.
    pub fn reset(&self) {
        let floor = Self::floor_value(self.kind);
        for cell in &self.cells {
            cell.store(floor, Ordering::Release);
        }
    }

    /// The floor value a cell starts and is cleared to: `0` for
    /// counting/summing, `i64::MIN` for max. A `Max` cell only ever rises
    /// (`record` raises it to `max(prev, value)`), so it must start below
    /// every representable value rather than at `0` — otherwise a store
    /// tracking only non-positive values (as `LatencyTracker`'s negated-min
    /// trick does) could never move off a `0` floor.
    fn floor_value(kind: BucketKind) -> i64 {
        match kind {
            BucketKind::Counting | BucketKind::Summing => 0,
            BucketKind::Max => i64::MIN,
        }
    }

    /// The identity element for this store's combine operation — equal to
    /// [`BucketStore::floor_value`], named separately because `reduce`'s use
    /// of it is conceptually distinct from a cell's rest state.
    fn identity(&self) -> i64 {
        Self::floor_value(self.kind)
    }

    fn combine(&self, a: i64, b: i64) -> i64 {
        match self.kind {
            BucketKind::Counting | BucketKind::Summing => a + b,
            BucketKind::Max => a.max(b),
        }
    }

    /// Combines zero or more same-length arrays element-wise per this
    /// store's rule. `reduce(&[])` yields a zero-length array; all inputs
    /// must share the first input's length or this fails with
    /// [`CoreError::InvalidArgument`].
    pub fn reduce(&self, colls: &[Vec<i64>]) -> CoreResult<Vec<i64>> {
        let Some(first) = colls.first() else {
            return Ok(Vec::new());
        };
        let len = first.len();
        for other in &colls[1..] {
            if other.len() != len {
                return Err(CoreError::InvalidArgument {
                    message: format!(
                        "reduce: mismatched array lengths, expected {len}, got {}",
                        other.len()
                    ),
                });
            }
        }
        let mut out = vec![self.identity(); len];
        for coll in colls {
            for (slot, value) in out.iter_mut().zip(coll.iter()) {
                *slot = self.combine(*slot, *value);
            }
        }
        Ok(out)
    }
}
