use crate::success_failure::SuccessFailureTracker;

/// Health as reported by a [`FaultDetector`] at a single admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    Healthy,
    Unhealthy,
}

/// Computes a rolling failure ratio over a [`SuccessFailureTracker`] and
/// compares it to a configured threshold.
///
/// Below the minimum sample size `M`, there isn't enough data in the window
/// to trust a ratio, so the detector reports `Healthy` unconditionally —
/// this keeps a freshly constructed breaker closed instead of tripping on
/// the first handful of calls.
pub struct FaultDetector {
    minimum_samples: i64,
    failure_ratio_threshold: f64,
}

impl FaultDetector {
    /// `failure_ratio_threshold` is a fraction in `[0.0, 1.0]`; `minimum_samples`
    /// must be non-negative.
    pub fn new(minimum_samples: i64, failure_ratio_threshold: f64) -> crate::ResilienceResult<Self> {
        if minimum_samples < 0 {
            return Err(crate::ResilienceError::InvalidArgument {
                message: "minimum_samples must be non-negative".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&failure_ratio_threshold) {
            return Err(crate::ResilienceError::InvalidArgument {
                message: "failure_ratio_threshold must be within [0.0, 1.0]".to_string(),
            });
        }
        Ok(Self { minimum_samples, failure_ratio_threshold })
    }

    /// Reads `tracker`'s current rolling success/failure counts and reports
    /// health per spec: `Healthy` if the sample is too small, otherwise
    /// `Unhealthy` when the failure ratio exceeds the threshold.
    pub fn check(&self, tracker: &SuccessFailureTracker) -> Health {
        let (success, failure) = tracker.rolling_success_and_failure();
        let total = success + failure;
        if total < self.minimum_samples {
            return Health::Healthy;
        }
        let failure_ratio = failure as f64 / total as f64;
        if failure_ratio >= self.failure_ratio_threshold {
            Health::Unhealthy
        } else {
            Health::Healthy
        }
    }
}
