//! Concurrent torture test for `CircuitBreaker`, in the spirit of
//! `metrics-util`'s `bucket-crusher` example: several threads hammer a
//! shared breaker with a mix of successes and failures while the main
//! thread periodically logs its rolling counters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use resilience::{CircuitBreaker, Collector};
use resilience_core::{Clock, SystemClock};
use tracing::info;

const PRODUCERS: usize = 4;
const RUN_FOR: Duration = Duration::from_secs(3);

fn main() {
    tracing_subscriber::fmt().with_ansi(true).with_level(true).init();

    info!("breaker-crusher");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    let breaker = Arc::new(
        CircuitBreaker::new("crusher", 10, 10_000, 20, 0.5, 500, clock).expect("valid breaker config"),
    );
    let stop = Arc::new(AtomicBool::new(false));
    let admitted = Arc::new(AtomicUsize::new(0));
    let rejected = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|id| {
            let breaker = breaker.clone();
            let stop = stop.clone();
            let admitted = admitted.clone();
            let rejected = rejected.clone();
            thread::spawn(move || {
                let mut calls = 0u64;
                while !stop.load(Ordering::Relaxed) {
                    calls += 1;
                    // Every third call "fails", enough pressure to trip the
                    // breaker periodically and exercise the half-open path.
                    let should_fail = calls % 3 == 0;
                    let outcome: Result<(), std::io::Error> = breaker.call(|| {
                        if should_fail {
                            Err(std::io::Error::new(std::io::ErrorKind::Other, "synthetic failure"))
                        } else {
                            Ok(())
                        }
                    });
                    match outcome {
                        Ok(()) => {
                            admitted.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            rejected.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    thread::sleep(Duration::from_millis(5));
                }
                info!(producer = id, "stopped");
            })
        })
        .collect();

    thread::sleep(RUN_FOR);
    stop.store(true, Ordering::Relaxed);
    for handle in producers {
        let _ = handle.join();
    }

    info!(
        admitted = admitted.load(Ordering::Relaxed),
        rejected = rejected.load(Ordering::Relaxed),
        "done"
    );
    for (key, value) in breaker.rolling_counters() {
        info!(key, value, "rolling counter");
    }
}
