//! Core cephalometric landmark regression primitives.
//!
//! This crate implements the heatmap pipeline around an opaque trained
//! scoring function: Gaussian target encoding, peak decoding, coordinate
//! rescaling, randomized training augmentation, deterministic dataset
//! splitting, and localization accuracy metrics. The scoring function itself
//! is injected through the [`scoring::HeatmapScorer`] trait and never
//! constructed here.

/// Randomized training-time augmentation of (image, landmark) pairs.
pub mod augment;
/// Training sample assembly (augment, resize, encode targets).
pub mod dataset;
/// Gaussian heatmap encoding, peak decoding, and coordinate rescaling.
pub mod heatmap;
/// Landmark data model (points, slot sets, display names).
pub mod landmarks;
/// Localization accuracy aggregation (MRE, SDR, per-landmark errors).
pub mod metrics;
/// Image pre-processing (grayscale resize, grid conversion).
pub mod preprocess;
/// High-level prediction runner over an injected scoring function.
pub mod predictor;
/// Capability interface for the opaque scoring function.
pub mod scoring;
/// Deterministic train/val/test partitioning.
pub mod split;

pub use augment::AugmentationConfig;
pub use dataset::{SampleOptions, TrainingSample, build_training_sample};
pub use heatmap::{DecodedPeak, HeatmapError, decode, encode, encode_stack, rescale};
pub use landmarks::{
    LANDMARK_NAMES, LandmarkError, LandmarkSet, NUM_LANDMARKS, Point, landmark_name,
};
pub use metrics::{EvalSample, MetricsError, MetricsReport, evaluate, evaluate_with_settings};
pub use predictor::{LandmarkPrediction, LandmarkPredictor, PredictionOutput};
pub use preprocess::{
    InputSize, PreprocessConfig, PreprocessOutput, preprocess_dynamic_image, preprocess_image,
};
pub use scoring::HeatmapScorer;
pub use split::{DatasetSplit, SplitError, split_items, split_with_settings};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
