//! Localization accuracy aggregation.
//!
//! Pairs of ground-truth and predicted coordinates are reduced to the mean
//! radial error, its standard deviation, success detection rates at fixed
//! pixel thresholds, and a per-landmark error breakdown. The reductions are
//! two-pass and order-independent, so evaluating a batch in any order yields
//! the same report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use cephnet_utils::config::MetricsSettings;

use crate::landmarks::{NUM_LANDMARKS, Point};

/// Errors raised when a report cannot be computed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MetricsError {
    /// No samples were supplied; the statistics are undefined and must not
    /// be reported as zeros.
    #[error("no samples to aggregate")]
    EmptyInput,
    /// A sample referenced a landmark slot outside 1..=19.
    #[error("sample references unknown landmark index {index}")]
    UnknownLandmark { index: usize },
}

/// One evaluated prediction: ground truth and prediction in the same frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalSample {
    /// Annotated coordinate.
    pub ground_truth: Point,
    /// Predicted coordinate in the same frame as the annotation.
    pub predicted: Point,
    /// 1-indexed landmark slot the pair belongs to.
    pub landmark_index: usize,
}

/// Aggregate localization accuracy report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    /// Mean radial error: the average Euclidean distance in pixels.
    pub mre: f64,
    /// Population standard deviation of the per-sample errors.
    pub std: f64,
    /// Success detection rates keyed `sdr_<threshold>px`, as percentages.
    #[serde(flatten)]
    pub sdr: BTreeMap<String, f64>,
    /// Mean radial error per 1-indexed landmark slot. Slots with no samples
    /// report `None` (JSON `null`) rather than being omitted or zeroed.
    pub per_landmark_mre: BTreeMap<usize, Option<f64>>,
    /// Number of samples aggregated.
    pub num_samples: usize,
}

/// Format a threshold as its report key (`sdr_2px`, `sdr_2.5px`).
fn sdr_key(threshold: f64) -> String {
    if threshold.fract() == 0.0 {
        format!("sdr_{}px", threshold as i64)
    } else {
        format!("sdr_{threshold}px")
    }
}

/// Aggregate evaluation pairs into a [`MetricsReport`].
///
/// Per-sample error is the Euclidean distance between prediction and ground
/// truth. The mean and standard deviation use a deterministic two-pass
/// reduction (sum, mean, then squared deviations) rather than a streaming
/// average, so batch ordering cannot introduce floating-point drift.
/// `SDR@t` counts samples with error strictly below `t`.
///
/// # Arguments
///
/// * `samples` - The evaluated pairs, all in one consistent frame.
/// * `thresholds` - Pixel thresholds for the success detection rates.
pub fn evaluate(samples: &[EvalSample], thresholds: &[f64]) -> Result<MetricsReport, MetricsError> {
    if samples.is_empty() {
        return Err(MetricsError::EmptyInput);
    }

    let mut errors = Vec::with_capacity(samples.len());
    let mut per_landmark: Vec<(f64, usize)> = vec![(0.0, 0); NUM_LANDMARKS];
    for sample in samples {
        if !(1..=NUM_LANDMARKS).contains(&sample.landmark_index) {
            return Err(MetricsError::UnknownLandmark {
                index: sample.landmark_index,
            });
        }
        let error = sample.ground_truth.distance(&sample.predicted) as f64;
        errors.push(error);
        let bucket = &mut per_landmark[sample.landmark_index - 1];
        bucket.0 += error;
        bucket.1 += 1;
    }

    let n = errors.len() as f64;
    let mre = errors.iter().sum::<f64>() / n;
    let variance = errors.iter().map(|e| (e - mre).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();

    let mut sdr = BTreeMap::new();
    for &threshold in thresholds {
        let hits = errors.iter().filter(|e| **e < threshold).count();
        sdr.insert(sdr_key(threshold), hits as f64 / n * 100.0);
    }

    let per_landmark_mre = per_landmark
        .iter()
        .enumerate()
        .map(|(idx, (sum, count))| {
            let mean = if *count > 0 {
                Some(sum / *count as f64)
            } else {
                None
            };
            (idx + 1, mean)
        })
        .collect();

    Ok(MetricsReport {
        mre,
        std,
        sdr,
        per_landmark_mre,
        num_samples: samples.len(),
    })
}

/// Aggregate using the thresholds from persisted [`MetricsSettings`].
pub fn evaluate_with_settings(
    samples: &[EvalSample],
    settings: &MetricsSettings,
) -> Result<MetricsReport, MetricsError> {
    evaluate(samples, &settings.sdr_thresholds)
}
