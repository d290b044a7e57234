//! Training sample assembly.
//!
//! Builds what the external training loop consumes from one annotated
//! radiograph: an optional augmentation pass at the original resolution, a
//! resize into the model grid, and a Gaussian target stack encoded from the
//! (rescaled) landmark coordinates. Validation and test samples skip the
//! augmentation pass by leaving `augment` unset.

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage};
use ndarray::{Array2, Array3};
use rand::Rng;

use cephnet_utils::config::AppSettings;
use cephnet_utils::timing_guard;

use crate::augment::{self, AugmentationConfig};
use crate::heatmap::encode_stack;
use crate::landmarks::{LandmarkSet, Point};
use crate::preprocess::{InputSize, PreprocessConfig, preprocess_dynamic_image};

/// Options controlling how one training sample is assembled.
#[derive(Debug, Clone)]
pub struct SampleOptions {
    /// Preprocessing (grid size and resize filter) for the input image.
    pub preprocess: PreprocessConfig,
    /// Gaussian spread for the target maps, in grid pixels.
    pub sigma: f32,
    /// Augmentation policy; `None` disables augmentation entirely.
    pub augment: Option<AugmentationConfig>,
}

impl Default for SampleOptions {
    fn default() -> Self {
        Self {
            preprocess: PreprocessConfig::default(),
            sigma: 5.0,
            augment: None,
        }
    }
}

impl SampleOptions {
    /// Derive options from persisted settings.
    ///
    /// # Arguments
    ///
    /// * `settings` - The loaded pipeline settings.
    /// * `augment` - Whether this sample belongs to the (augmented) training
    ///   subset; validation and test assembly pass `false`.
    pub fn from_settings(settings: &AppSettings, augment: bool) -> Self {
        Self {
            preprocess: (&settings.input).into(),
            sigma: settings.heatmap.sigma,
            augment: (augment && settings.augmentation.enabled)
                .then(|| (&settings.augmentation).into()),
        }
    }
}

/// One assembled training sample.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    /// Normalized `[0, 1]` input grid, indexed `(row, col)`.
    pub input: Array2<f32>,
    /// Per-slot Gaussian target stack, `[NUM_LANDMARKS, rows, cols]`.
    pub targets: Array3<f32>,
    /// Landmark coordinates after augmentation, in original pixel space.
    pub landmarks: Vec<Point>,
}

/// Assemble one (input grid, target stack) pair from an annotated image.
///
/// The landmark set must be fully annotated; a gap surfaces as a
/// [`crate::landmarks::LandmarkError::Missing`] rather than a fabricated
/// coordinate. Augmentation happens at the original resolution so the final
/// clamp guarantees every coordinate encodes inside the grid.
///
/// # Arguments
///
/// * `image` - The grayscale radiograph at original resolution.
/// * `landmarks` - The annotated set in original pixel space.
/// * `options` - Grid size, sigma, and optional augmentation policy.
/// * `rng` - Caller-owned generator; only drawn from when augmenting.
pub fn build_training_sample<R: Rng>(
    image: &GrayImage,
    landmarks: &LandmarkSet,
    options: &SampleOptions,
    rng: &mut R,
) -> Result<TrainingSample> {
    let _guard = timing_guard("cephnet_core::build_training_sample", log::Level::Debug);

    let points = landmarks
        .require_all()
        .context("training samples require a fully annotated landmark set")?;

    let (image, points) = match &options.augment {
        Some(config) => augment::apply(image, &points, config, rng),
        None => (image.clone(), points),
    };
    let original_size = image.dimensions();

    let prep = preprocess_dynamic_image(&DynamicImage::ImageLuma8(image), &options.preprocess)?;

    let annotated = LandmarkSet::from_points(&points)
        .context("augmentation must preserve the landmark count")?;
    let InputSize { width, height } = options.preprocess.input_size;
    let targets = encode_stack(&annotated, original_size, (width, height), options.sigma)?;

    Ok(TrainingSample {
        input: prep.grid,
        targets,
        landmarks: points,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heatmap::decode;
    use crate::landmarks::NUM_LANDMARKS;
    use image::Luma;
    use ndarray::Axis;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn annotated_set(width: u32, height: u32) -> LandmarkSet {
        let points: Vec<Point> = (0..NUM_LANDMARKS)
            .map(|i| {
                Point::new(
                    (i as f32 + 1.0) / (NUM_LANDMARKS as f32 + 1.0) * width as f32,
                    (i as f32 + 1.0) / (NUM_LANDMARKS as f32 + 1.0) * height as f32,
                )
            })
            .collect();
        LandmarkSet::from_points(&points).unwrap()
    }

    fn test_image(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| Luma([((x + 2 * y) % 256) as u8]))
    }

    #[test]
    fn sample_shapes_follow_the_grid() {
        let options = SampleOptions {
            preprocess: PreprocessConfig {
                input_size: InputSize::new(64, 64),
                ..Default::default()
            },
            sigma: 2.0,
            augment: None,
        };
        let mut rng = StdRng::seed_from_u64(0);

        let sample = build_training_sample(
            &test_image(160, 120),
            &annotated_set(160, 120),
            &options,
            &mut rng,
        )
        .expect("sample");

        assert_eq!(sample.input.shape(), &[64, 64]);
        assert_eq!(sample.targets.shape(), &[NUM_LANDMARKS, 64, 64]);
        assert!(sample.input.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(sample.targets.iter().all(|v| *v >= 0.0));
    }

    #[test]
    fn unaugmented_targets_peak_at_the_rescaled_annotation() {
        let options = SampleOptions {
            preprocess: PreprocessConfig {
                input_size: InputSize::new(64, 64),
                ..Default::default()
            },
            sigma: 1.5,
            augment: None,
        };
        let mut rng = StdRng::seed_from_u64(0);
        let landmarks = annotated_set(128, 128);

        let sample =
            build_training_sample(&test_image(128, 128), &landmarks, &options, &mut rng)
                .expect("sample");

        for slot in 1..=NUM_LANDMARKS {
            let expected = landmarks.get(slot).unwrap();
            let peak = decode(sample.targets.index_axis(Axis(0), slot - 1)).expect("decode");
            // Original coords halve into the 64-grid; the peak snaps to the
            // nearest cell.
            assert!((peak.point.x - expected.x / 2.0).abs() <= 1.0, "slot {slot}");
            assert!((peak.point.y - expected.y / 2.0).abs() <= 1.0, "slot {slot}");
        }
    }

    #[test]
    fn augmented_sample_is_seed_deterministic() {
        let options = SampleOptions {
            preprocess: PreprocessConfig {
                input_size: InputSize::new(32, 32),
                ..Default::default()
            },
            sigma: 2.0,
            augment: Some(AugmentationConfig::default()),
        };
        let image = test_image(96, 96);
        let landmarks = annotated_set(96, 96);

        let a = build_training_sample(&image, &landmarks, &options, &mut StdRng::seed_from_u64(5))
            .expect("sample");
        let b = build_training_sample(&image, &landmarks, &options, &mut StdRng::seed_from_u64(5))
            .expect("sample");
        assert_eq!(a.landmarks, b.landmarks);
        assert_eq!(a.input, b.input);
        assert_eq!(a.targets, b.targets);
    }

    #[test]
    fn augmented_landmarks_stay_inside_the_image() {
        let options = SampleOptions {
            preprocess: PreprocessConfig {
                input_size: InputSize::new(32, 32),
                ..Default::default()
            },
            sigma: 2.0,
            augment: Some(AugmentationConfig::default()),
        };
        let image = test_image(80, 60);
        let landmarks = annotated_set(80, 60);
        let mut rng = StdRng::seed_from_u64(21);

        for _ in 0..10 {
            let sample =
                build_training_sample(&image, &landmarks, &options, &mut rng).expect("sample");
            for p in &sample.landmarks {
                assert!((0.0..=79.0).contains(&p.x));
                assert!((0.0..=59.0).contains(&p.y));
            }
        }
    }

    #[test]
    fn missing_annotation_fails_assembly() {
        let mut landmarks = annotated_set(64, 64);
        landmarks.set(11, None).unwrap();
        let options = SampleOptions {
            sigma: 2.0,
            ..Default::default()
        };
        let mut rng = StdRng::seed_from_u64(0);

        let err = build_training_sample(&test_image(64, 64), &landmarks, &options, &mut rng)
            .unwrap_err();
        assert!(err.to_string().contains("fully annotated"));
    }
}
