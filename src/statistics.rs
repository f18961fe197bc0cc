//! Running mean and variance.
//!
//! [`RunningStatistics`] keeps the mean and the sum of squared deviations of
//! a sequence of samples using Welford's online algorithm, so the stream-wide
//! bitrate spread can be reported after every chunk without storing the
//! chunk history.
//!
//! # Example
//!
//! ```
//! use gopstat::RunningStatistics;
//!
//! let mut statistics = RunningStatistics::new();
//! for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
//!     statistics.update(sample);
//! }
//! assert_eq!(statistics.count(), 8);
//! assert!((statistics.mean() - 5.0).abs() < 1e-12);
//! assert!((statistics.standard_deviation() - 2.0).abs() < 1e-12);
//! ```

use serde::Serialize;

/// Online mean / population variance accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RunningStatistics {
    count: u64,
    mean: f64,
    /// Sum of squared deviations from the current mean.
    m2: f64,
}

impl RunningStatistics {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one sample.
    pub fn update(&mut self, sample: f64) {
        self.count += 1;
        let delta = sample - self.mean;
        self.mean += delta / self.count as f64;
        // The second factor uses the updated mean.
        self.m2 += delta * (sample - self.mean);
    }

    /// Number of samples seen.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean of the samples, `0.0` when empty.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance, `0.0` when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Population standard deviation.
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Standard deviation divided by the mean.
    ///
    /// Follows IEEE division when the mean is zero (`NaN` or infinity).
    pub fn coefficient_of_variation(&self) -> f64 {
        self.standard_deviation() / self.mean
    }
}
