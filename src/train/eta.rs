use std::fmt;

use serde::Serialize;

/// Remaining wall-clock time split into whole hours, minutes and seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Eta {
    pub hours:   u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Eta {
    /// Floors `secs` into h/m/s. Negative and non-finite inputs give zero.
    pub fn from_seconds(secs: f64) -> Eta {
        let total = if secs.is_finite() && secs > 0.0 { secs.floor() as u64 } else { 0 };
        Eta {
            hours:   total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }

    pub fn total_seconds(&self) -> u64 {
        self.hours * 3600 + self.minutes * 60 + self.seconds
    }
}

impl fmt::Display for Eta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

/// Projected seconds left in a run.
///
///   remaining_train_iters * mean_iter_time
///     + val_batches * val_passes * mean_val_time
///
/// The second term covers the interleaved validation passes, which the
/// training timings never see.
pub fn estimate_seconds(
    remaining_train_iters: usize,
    mean_iter_time: f64,
    val_batches: usize,
    val_passes: usize,
    mean_val_time: f64,
) -> f64 {
    remaining_train_iters as f64 * mean_iter_time
        + val_batches as f64 * val_passes as f64 * mean_val_time
}

/// ETA bookkeeping fixed at the start of a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtaEstimator {
    pub total_train_iters: usize,
    pub val_batches:       usize,
    pub val_step:          usize,
}

impl EtaEstimator {
    pub fn new(train_batches: usize, epochs: usize, val_batches: usize, val_step: usize) -> Self {
        EtaEstimator {
            total_train_iters: train_batches * epochs,
            val_batches,
            val_step,
        }
    }

    /// Validation passes over the whole run, `ceil(total / val_step)`.
    pub fn val_passes(&self) -> usize {
        if self.val_step == 0 {
            return 0;
        }
        self.total_train_iters.div_ceil(self.val_step)
    }

    /// ETA after finishing iteration `global_iter` (0-based).
    ///
    /// Validation time per batch is estimated from training fetch + forward
    /// time, since validation skips backward.
    pub fn estimate(&self, global_iter: usize, mean_iter_time: f64, mean_val_time: f64) -> Eta {
        let remaining = self.total_train_iters.saturating_sub(global_iter + 1);
        Eta::from_seconds(estimate_seconds(
            remaining,
            mean_iter_time,
            self.val_batches,
            self.val_passes(),
            mean_val_time,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn decode_splits_hours_minutes_seconds() {
        let eta = Eta::from_seconds(3725.9);
        assert_eq!(eta, Eta { hours: 1, minutes: 2, seconds: 5 });
        assert_eq!(eta.to_string(), "1h 2m 5s");
        assert_eq!(eta.total_seconds(), 3725);
    }

    #[test]
    fn negative_and_nan_durations_clamp_to_zero() {
        assert_eq!(Eta::from_seconds(-12.0), Eta::default());
        assert_eq!(Eta::from_seconds(f64::NAN), Eta::default());
        assert_eq!(Eta::from_seconds(0.0), Eta::default());
    }

    #[test]
    fn estimator_counts_validation_passes() {
        // 10 batches x 3 epochs, validate every 7 iterations -> 5 passes
        let eta = EtaEstimator::new(10, 3, 4, 7);
        assert_eq!(eta.total_train_iters, 30);
        assert_eq!(eta.val_passes(), 5);
        // 29 train iters left at 1s, 4 * 5 val batches at 0.5s
        assert_eq!(eta.estimate(0, 1.0, 0.5).total_seconds(), 39);
        // past the end nothing is left to train
        assert_eq!(eta.estimate(100, 1.0, 0.0).total_seconds(), 0);
    }

    proptest! {
        #[test]
        fn estimate_is_never_negative(
            remaining in 0usize..100_000,
            iter_time in 0.0f64..10.0,
            val_batches in 0usize..1_000,
            passes in 0usize..100,
            val_time in 0.0f64..10.0,
        ) {
            let secs = estimate_seconds(remaining, iter_time, val_batches, passes, val_time);
            prop_assert!(secs >= 0.0);
        }

        #[test]
        fn estimate_decreases_with_fewer_remaining_iters(
            remaining in 1usize..100_000,
            iter_time in 0.001f64..10.0,
            val_batches in 0usize..1_000,
            passes in 0usize..100,
            val_time in 0.0f64..10.0,
        ) {
            let before = estimate_seconds(remaining, iter_time, val_batches, passes, val_time);
            let after = estimate_seconds(remaining - 1, iter_time, val_batches, passes, val_time);
            prop_assert!(after < before);
        }
    }
}
