use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, RecvTimeoutError, SendTimeoutError, Sender};
use parking_lot::Mutex;
use resilience_core::{BucketKind, Clock, RollingCount, RollingWindow};

use crate::collector::Collector;
use crate::error::{RejectionGate, ResilienceError, ResilienceResult, WindowCounters};

type JobBody = Box<dyn FnOnce() + Send + 'static>;

struct Job {
    cancelled: Arc<AtomicBool>,
    started: Arc<AtomicBool>,
    body: JobBody,
}

struct Counters {
    submitted: RollingWindow,
    completed: RollingWindow,
    rejected: RollingWindow,
    timed_out: RollingWindow,
    cumulative_submitted: AtomicI64,
    cumulative_completed: AtomicI64,
    cumulative_rejected: AtomicI64,
    cumulative_timed_out: AtomicI64,
}

/// A fixed worker pool backed by a bounded queue.
///
/// Submission is non-blocking by default: a full queue is rejected
/// immediately. Supplying a per-call timeout instead lets the submission
/// wait (up to that same deadline) for a worker to become free — see
/// `SPEC_FULL.md` §4.6 for why a timed-out enqueue surfaces as `Timeout`
/// rather than `Rejected`. Submission is the only place in this crate a
/// caller's thread can block.
pub struct BoundedThreadPool {
    name: String,
    sender: Sender<Job>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    shutting_down: Arc<AtomicBool>,
    counters: Arc<Counters>,
    worker_count: usize,
    queue_capacity: usize,
}

impl BoundedThreadPool {
    /// Creates a pool of `workers` threads pulling from a queue bounded at
    /// `queue_capacity` (`0` is a valid, rendezvous-only queue). `n` and
    /// `window_ms` size the rolling counters (submitted/completed/rejected/
    /// timed-out).
    pub fn new(
        name: impl Into<String>,
        workers: usize,
        queue_capacity: usize,
        n: usize,
        window_ms: i64,
        clock: Arc<dyn Clock>,
    ) -> ResilienceResult<Self> {
        if workers == 0 {
            return Err(ResilienceError::InvalidArgument {
                message: "thread pool must have at least one worker".to_string(),
            });
        }

        let (sender, receiver) = bounded::<Job>(queue_capacity);
        let counters = Arc::new(Counters {
            submitted: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            completed: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            rejected: RollingWindow::new(BucketKind::Counting, n, window_ms, clock.clone())?,
            timed_out: RollingWindow::new(BucketKind::Counting, n, window_ms, clock)?,
            cumulative_submitted: AtomicI64::new(0),
            cumulative_completed: AtomicI64::new(0),
            cumulative_rejected: AtomicI64::new(0),
            cumulative_timed_out: AtomicI64::new(0),
        });
        let shutting_down = Arc::new(AtomicBool::new(false));
        let name = name.into();

        let handles = (0..workers)
            .map(|worker_id| {
                let receiver = receiver.clone();
                let shutting_down = shutting_down.clone();
                let counters = counters.clone();
                let pool_name = name.clone();
                std::thread::Builder::new()
                    .name(format!("{pool_name}-worker-{worker_id}"))
                    .spawn(move || loop {
                        match receiver.recv_timeout(Duration::from_millis(50)) {
                            Ok(job) => {
                                if job.cancelled.load(Ordering::Acquire) {
                                    continue;
                                }
                                job.started.store(true, Ordering::Release);
                                (job.body)();
                                counters.completed.record(1);
                                counters.cumulative_completed.fetch_add(1, Ordering::Relaxed);
                            }
                            Err(RecvTimeoutError::Timeout) => {
                                if shutting_down.load(Ordering::Acquire) {
                                    break;
                                }
                            }
                            Err(RecvTimeoutError::Disconnected) => break,
                        }
                    })
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Ok(Self {
            name,
            sender,
            workers: Mutex::new(handles),
            shutting_down,
            counters,
            worker_count: workers,
            queue_capacity,
        })
    }

    /// Submits `f`, blocking the caller until it completes, with no
    /// deadline. A full queue rejects immediately.
    pub fn submit<F, T>(&self, f: F) -> ResilienceResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.submit_with_timeout(f, None)
    }

    /// As [`BoundedThreadPool::submit`], but bounds the *whole* call —
    /// waiting for queue space, waiting for the task to start, and waiting
    /// for it to finish — to `timeout`.
    pub fn submit_with_timeout<F, T>(
        &self,
        f: F,
        timeout: Option<Duration>,
    ) -> ResilienceResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        if self.shutting_down.load(Ordering::Acquire) {
            self.record_rejected();
            return Err(self.rejected_error());
        }

        let deadline_start = Instant::now();
        let (result_tx, result_rx) = bounded::<T>(1);
        let started = Arc::new(AtomicBool::new(false));
        let cancelled = Arc::new(AtomicBool::new(false));
        let body: JobBody = Box::new(move || {
            let value = f();
            let _ = result_tx.send(value);
        });
        let job = Job { cancelled: cancelled.clone(), started: started.clone(), body };

        self.counters.submitted.record(1);
        self.counters.cumulative_submitted.fetch_add(1, Ordering::Relaxed);

        match timeout {
            None => {
                if self.sender.try_send(job).is_err() {
                    self.record_rejected();
                    return Err(self.rejected_error());
                }
            }
            Some(budget) => match self.sender.send_timeout(job, budget) {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    self.record_timed_out();
                    return Err(ResilienceError::Timeout { after: budget });
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    self.record_rejected();
                    return Err(self.rejected_error());
                }
            },
        }

        match timeout {
            None => result_rx.recv().map_err(|_| {
                // The job was dropped (e.g. the pool shut down) before it ran.
                self.record_rejected();
                self.rejected_error()
            }),
            Some(budget) => {
                let remaining = budget.saturating_sub(deadline_start.elapsed());
                match result_rx.recv_timeout(remaining) {
                    Ok(value) => Ok(value),
                    Err(_) => {
                        // Pre-start cancellation removes it from the queue;
                        // if it already started, this is a best-effort
                        // interrupt only — the worker thread runs to
                        // completion and its result is simply discarded.
                        cancelled.store(true, Ordering::Release);
                        self.record_timed_out();
                        Err(ResilienceError::Timeout { after: budget })
                    }
                }
            }
        }
    }

    fn record_rejected(&self) {
        self.counters.rejected.record(1);
        self.counters.cumulative_rejected.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.name, "rejected: queue full or pool shut down");
    }

    fn record_timed_out(&self) {
        self.counters.timed_out.record(1);
        self.counters.cumulative_timed_out.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.name, "task timed out before completion");
    }

    fn rejected_error(&self) -> ResilienceError {
        ResilienceError::Rejected {
            gate: RejectionGate::ThreadPoolQueue,
            counters: WindowCounters {
                rolling_rejected: self.counters.rejected.get_all_elements().iter().sum(),
                cumulative_rejected: self.counters.cumulative_rejected.load(Ordering::Relaxed),
            },
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    /// Stops accepting new work, lets already-queued work drain, and waits
    /// up to `wait` for workers to finish. Workers still running past `wait`
    /// are left to finish on their own; this method does not forcibly kill
    /// threads.
    ///
    /// `wait` bounds a real OS thread join, not a rolling-metrics
    /// observation, so it is measured with `Instant` rather than the
    /// injected [`Clock`] — the latter governs bucket rotation, not this.
    pub fn shutdown(&self, wait: Duration) {
        self.shutting_down.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + wait;
        let mut workers = self.workers.lock();
        while Instant::now() < deadline && !workers.iter().all(|h| h.is_finished()) {
            std::thread::sleep(Duration::from_millis(5));
        }
        for handle in workers.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                tracing::warn!(pool = %self.name, "worker did not finish within shutdown wait bound");
            }
        }
    }
}

impl Collector for BoundedThreadPool {
    fn name(&self) -> &str {
        &self.name
    }

    fn rolling_counters(&self) -> Vec<(&'static str, i64)> {
        let sum = |w: &RollingWindow| -> i64 { w.get_all_elements().iter().sum() };
        vec![
            ("pool.submitted", sum(&self.counters.submitted)),
            ("pool.completed", sum(&self.counters.completed)),
            ("pool.rejected", sum(&self.counters.rejected)),
            ("pool.timed_out", sum(&self.counters.timed_out)),
        ]
    }

    fn cumulative_counters(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("pool.cumulative_submitted", self.counters.cumulative_submitted.load(Ordering::Relaxed)),
            ("pool.cumulative_completed", self.counters.cumulative_completed.load(Ordering::Relaxed)),
            ("pool.cumulative_rejected", self.counters.cumulative_rejected.load(Ordering::Relaxed)),
            ("pool.cumulative_timed_out", self.counters.cumulative_timed_out.load(Ordering::Relaxed)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_utils::thread::scope;
    use resilience_core::SystemClock;
    use std::sync::atomic::AtomicUsize;

    fn pool(workers: usize, queue_capacity: usize) -> BoundedThreadPool {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
        BoundedThreadPool::new("test", workers, queue_capacity, 4, 4000, clock).unwrap()
    }

    #[test]
    fn submit_runs_the_task_and_returns_its_value() {
        let pool = pool(2, 4);
        let result = pool.submit(|| 1 + 1).unwrap();
        assert_eq!(result, 2);
        pool.shutdown(Duration::from_secs(1));
    }

    // Scenario S6: queue=0, one worker busy on a 2s task; a submission with
    // a 100ms deadline times out, and the timeout counter reads 1.
    #[test]
    fn s6_submission_with_tight_deadline_times_out_while_worker_is_busy() {
        let pool = pool(1, 0);
        let release = Arc::new(AtomicBool::new(false));
        let release_for_job = release.clone();
        pool.submit(move || {
            while !release_for_job.load(Ordering::Acquire) {
                std::thread::sleep(Duration::from_millis(5));
            }
        })
        .ok();
        // Give the long-running job a moment to actually start occupying
        // the only worker before we probe the pool with a short deadline.
        std::thread::sleep(Duration::from_millis(20));

        let outcome = pool.submit_with_timeout(|| 42, Some(Duration::from_millis(100)));
        assert!(matches!(outcome, Err(ResilienceError::Timeout { .. })));
        assert_eq!(pool.rolling_counters().iter().find(|(k, _)| *k == "pool.timed_out").unwrap().1, 1);

        release.store(true, Ordering::Release);
        pool.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn full_queue_rejects_without_a_timeout() {
        let pool = pool(1, 0);
        let gate = Arc::new(AtomicBool::new(false));
        scope(|s| {
            let gate_for_job = gate.clone();
            // Occupy the single worker so the zero-capacity queue is "full".
            // Scoped so the spawned thread is guaranteed to have joined (and
            // so stopped borrowing `pool`) before this function returns.
            s.spawn(|_| {
                let _ = pool.submit(move || {
                    while !gate_for_job.load(Ordering::Acquire) {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                });
            });
            std::thread::sleep(Duration::from_millis(20));

            let result = pool.submit(|| 1);
            assert!(matches!(
                result,
                Err(ResilienceError::Rejected { gate: RejectionGate::ThreadPoolQueue, .. })
            ));

            gate.store(true, Ordering::Release);
        })
        .unwrap();
        pool.shutdown(Duration::from_secs(2));
    }

    #[test]
    fn completed_counter_increments_on_success() {
        let pool = pool(2, 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 5);
        assert_eq!(
            pool.rolling_counters().iter().find(|(k, _)| *k == "pool.completed").unwrap().1,
            5
        );
        pool.shutdown(Duration::from_secs(1));
    }
}
