//! Sample-window summary statistics.

use thiserror::Error;

/// Errors from summary computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatsError {
    /// No samples to summarize
    #[error("cannot summarize an empty sample window")]
    EmptySample,
}

/// Population standard deviation of `samples`, rounded to 2 decimal digits.
///
/// Population, not sample: the sum of squared deviations is divided by the
/// sample count, never count − 1. A single sample therefore yields 0.00.
/// Order-independent and deterministic.
pub fn population_std_dev(samples: &[f64]) -> Result<f64, StatsError> {
    if samples.is_empty() {
        return Err(StatsError::EmptySample);
    }
    let count = samples.len() as f64;
    let mean = samples.iter().sum::<f64>() / count;
    let variance = samples
        .iter()
        .map(|sample| {
            let deviation = sample - mean;
            deviation * deviation
        })
        .sum::<f64>()
        / count;
    Ok(round_2dp(variance.sqrt()))
}

/// Round to 2 decimal digits, half away from zero.
pub fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
