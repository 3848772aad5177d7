use serde::{Deserialize, Serialize};
use crate::error::{HarnessError, Result};

/// Width of the outlier cutoff, in standard deviations.
pub const CUTOFF_STD_DEVS: f64 = 2.0;

/// Statistics behind one reduction, kept around for logging.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
    pub lower: f64,
    pub upper: f64,
    pub kept: usize,
    pub discarded: usize,
    pub reduced: u64,
}

/// Collapses `samples` into one representative latency.
///
/// Mean and population standard deviation are computed once over all samples,
/// then the mean is recomputed over the samples within the closed interval
/// `[mean - 2·std, mean + 2·std]`. The result is truncated, not rounded.
pub fn reduce(samples: &[u64]) -> Result<u64> {
    summarize(samples).map(|summary| summary.reduced)
}

/// Same as [`reduce`], but also returns the intermediate statistics.
pub fn summarize(samples: &[u64]) -> Result<Summary> {
    if samples.is_empty() {
        return Err(HarnessError::EmptyReduction);
    }

    let n = samples.len() as f64;
    let mean = samples.iter().map(|&s| s as f64).sum::<f64>() / n;
    let variance = samples.iter().map(|&s| (s as f64 - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let cut_off = std_dev * CUTOFF_STD_DEVS;
    let (lower, upper) = (mean - cut_off, mean + cut_off);

    // Bounds are inclusive: a constant series (std 0) keeps every sample
    let kept: Vec<f64> = samples
        .iter()
        .map(|&s| s as f64)
        .filter(|&s| s >= lower && s <= upper)
        .collect();

    if kept.is_empty() {
        return Err(HarnessError::EmptyReduction);
    }

    let filtered_mean = kept.iter().sum::<f64>() / kept.len() as f64;
    if !filtered_mean.is_finite() {
        return Err(HarnessError::EmptyReduction);
    }

    Ok(Summary {
        mean,
        std_dev,
        lower,
        upper,
        kept: kept.len(),
        discarded: samples.len() - kept.len(),
        reduced: filtered_mean.trunc() as u64,
    })
}
