//! High-level landmark prediction runner.
//!
//! Couples an injected [`HeatmapScorer`] with preprocessing and peak decoding:
//! resize the radiograph to the model grid, score it, extract each map's peak,
//! and rescale the peaks back into the original image's pixel space.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use image::DynamicImage;
use serde::Serialize;

use cephnet_utils::timing_guard;

use crate::heatmap::{decode, rescale};
use crate::landmarks::{NUM_LANDMARKS, Point};
use crate::preprocess::{PreprocessConfig, PreprocessOutput, preprocess_dynamic_image, preprocess_image};
use crate::scoring::HeatmapScorer;

/// One predicted landmark position with its peak confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LandmarkPrediction {
    /// Predicted coordinate in original image pixel space.
    pub point: Point,
    /// Peak value of the landmark's likelihood map.
    pub confidence: f32,
}

/// Result of running the predictor on an image.
///
/// Contains the per-slot predictions along with metadata to map them back to
/// the original image's coordinate space.
#[derive(Debug, Clone, Serialize)]
pub struct PredictionOutput {
    /// Predicted positions keyed by 1-indexed landmark slot.
    pub landmarks: BTreeMap<usize, LandmarkPrediction>,
    /// The horizontal scale factor from grid to original coordinates.
    pub scale_x: f32,
    /// The vertical scale factor from grid to original coordinates.
    pub scale_y: f32,
    /// The original dimensions of the input image.
    pub original_size: (u32, u32),
}

/// Convenience wrapper that couples a scoring function with preprocessing.
///
/// This is the main entry point for running landmark prediction.
#[derive(Debug)]
pub struct LandmarkPredictor<S: HeatmapScorer> {
    scorer: S,
    preprocess: PreprocessConfig,
}

impl<S: HeatmapScorer> LandmarkPredictor<S> {
    /// Construct a predictor from a scoring function and preprocessing configuration.
    ///
    /// # Arguments
    ///
    /// * `scorer` - The scoring function to run on preprocessed grids.
    /// * `preprocess` - The configuration for image preprocessing.
    pub fn new(scorer: S, preprocess: PreprocessConfig) -> Self {
        Self { scorer, preprocess }
    }

    /// Run prediction on an image file path.
    ///
    /// # Arguments
    ///
    /// * `path` - The path to the image file.
    pub fn predict_path<P: AsRef<Path>>(&self, path: P) -> Result<PredictionOutput> {
        let _guard = timing_guard("cephnet_core::predict_path", log::Level::Debug);
        let prep = preprocess_image(path, &self.preprocess)?;
        self.run_preprocessed(prep)
    }

    /// Run prediction on an in-memory dynamic image.
    ///
    /// # Arguments
    ///
    /// * `image` - The dynamic image to process.
    pub fn predict_image(&self, image: &DynamicImage) -> Result<PredictionOutput> {
        let _guard = timing_guard("cephnet_core::predict_image", log::Level::Debug);
        let prep = preprocess_dynamic_image(image, &self.preprocess)?;
        self.run_preprocessed(prep)
    }

    /// Access the preprocessing configuration.
    pub fn preprocess_config(&self) -> &PreprocessConfig {
        &self.preprocess
    }

    /// Score a preprocessed grid and decode every map into a prediction.
    fn run_preprocessed(&self, prep: PreprocessOutput) -> Result<PredictionOutput> {
        let _guard = timing_guard("cephnet_core::run_preprocessed", log::Level::Trace);

        let maps = {
            let _guard = timing_guard("cephnet_core::score", log::Level::Debug);
            self.scorer.score(&prep.grid)?
        };
        let shape = maps.shape();
        anyhow::ensure!(
            shape[0] == NUM_LANDMARKS,
            "scorer must return {NUM_LANDMARKS} maps (got {})",
            shape[0]
        );
        let map_size = (shape[2] as u32, shape[1] as u32);

        let mut landmarks = BTreeMap::new();
        for slot in 0..NUM_LANDMARKS {
            let map = maps.index_axis(ndarray::Axis(0), slot);
            let peak = decode(map)?;
            let point = rescale(peak.point, map_size, prep.original_size);
            landmarks.insert(
                slot + 1,
                LandmarkPrediction {
                    point,
                    confidence: peak.confidence,
                },
            );
        }

        Ok(PredictionOutput {
            landmarks,
            scale_x: prep.scale_x,
            scale_y: prep.scale_y,
            original_size: prep.original_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::encode;
    use crate::preprocess::InputSize;
    use image::{GrayImage, Luma};
    use ndarray::{Array2, Array3, Axis};

    /// Deterministic double: places each slot's peak on a fixed diagonal.
    #[derive(Debug)]
    struct DiagonalScorer {
        resolution: usize,
    }

    impl HeatmapScorer for DiagonalScorer {
        fn score(&self, _grid: &Array2<f32>) -> Result<Array3<f32>> {
            let mut stack =
                Array3::<f32>::zeros((NUM_LANDMARKS, self.resolution, self.resolution));
            for slot in 0..NUM_LANDMARKS {
                let coord = (slot * 3) as f32;
                let map = encode(
                    Point::new(coord, coord),
                    self.resolution,
                    self.resolution,
                    1.5,
                );
                stack.index_axis_mut(Axis(0), slot).assign(&map);
            }
            Ok(stack)
        }
    }

    /// Double that returns a map stack containing a NaN.
    #[derive(Debug)]
    struct BrokenScorer;

    impl HeatmapScorer for BrokenScorer {
        fn score(&self, _grid: &Array2<f32>) -> Result<Array3<f32>> {
            let mut stack = Array3::<f32>::zeros((NUM_LANDMARKS, 8, 8));
            stack[(0, 2, 2)] = f32::NAN;
            Ok(stack)
        }
    }

    fn test_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::from_fn(width, height, |x, y| {
            Luma([((x * 3 + y * 5) % 256) as u8])
        }))
    }

    #[test]
    fn predict_rescales_peaks_into_original_space() {
        let predictor = LandmarkPredictor::new(
            DiagonalScorer { resolution: 64 },
            PreprocessConfig {
                input_size: InputSize::new(64, 64),
                ..Default::default()
            },
        );

        let output = predictor
            .predict_image(&test_image(128, 256))
            .expect("predict");

        assert_eq!(output.original_size, (128, 256));
        assert_eq!(output.landmarks.len(), NUM_LANDMARKS);

        // Slot 5 peaks at grid (12, 12): x scales by 2, y by 4.
        let prediction = output.landmarks[&5];
        assert!((prediction.point.x - 24.0).abs() < 1e-3);
        assert!((prediction.point.y - 48.0).abs() < 1e-3);
        assert!((prediction.confidence - 1.0).abs() < 1e-3);
    }

    #[test]
    fn broken_scorer_output_is_rejected() {
        let predictor = LandmarkPredictor::new(
            BrokenScorer,
            PreprocessConfig {
                input_size: InputSize::new(8, 8),
                ..Default::default()
            },
        );

        let err = predictor.predict_image(&test_image(8, 8)).unwrap_err();
        assert!(err.to_string().contains("not finite"));
    }
}
