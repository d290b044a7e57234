use anyhow::Result;
use image::{DynamicImage, GrayImage, Luma};
use ndarray::{Array2, Array3, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;

use cephnet_core::{
    AugmentationConfig, EvalSample, HeatmapScorer, InputSize, LandmarkPredictor, LandmarkSet,
    NUM_LANDMARKS, Point, PreprocessConfig, SampleOptions, build_training_sample, decode, encode,
    encode_stack, evaluate, rescale, split_items,
};
use cephnet_utils::load_fixture_json;

/// Scoring double that "knows" the ground truth: it encodes the annotated
/// coordinates (rescaled into its output grid) exactly the way the target
/// encoder does, so the decode path should recover them.
#[derive(Debug)]
struct OracleScorer {
    truth: Vec<Point>,
    original_size: (u32, u32),
    resolution: usize,
}

impl HeatmapScorer for OracleScorer {
    fn score(&self, _grid: &Array2<f32>) -> Result<Array3<f32>> {
        let mut stack =
            Array3::<f32>::zeros((NUM_LANDMARKS, self.resolution, self.resolution));
        for (slot, point) in self.truth.iter().enumerate() {
            let scaled = rescale(
                *point,
                self.original_size,
                (self.resolution as u32, self.resolution as u32),
            );
            let map = encode(scaled, self.resolution, self.resolution, 2.0);
            stack.index_axis_mut(Axis(0), slot).assign(&map);
        }
        Ok(stack)
    }
}

fn synthetic_radiograph(width: u32, height: u32) -> GrayImage {
    // Smooth gradient with a bright ridge, enough texture for resampling.
    GrayImage::from_fn(width, height, |x, y| {
        let base = (x / 2 + y / 3) % 200;
        let ridge = if x.abs_diff(width / 2) < 4 { 55 } else { 0 };
        Luma([(base + ridge) as u8])
    })
}

fn annotation(width: u32, height: u32) -> LandmarkSet {
    let points: Vec<Point> = (0..NUM_LANDMARKS)
        .map(|i| {
            let t = (i as f32 + 1.0) / (NUM_LANDMARKS as f32 + 1.0);
            Point::new(t * (width as f32 - 20.0) + 10.0, (1.0 - t) * (height as f32 - 20.0) + 10.0)
        })
        .collect();
    LandmarkSet::from_points(&points).unwrap()
}

#[test]
fn end_to_end_predictions_evaluate_accurately() {
    let (width, height) = (200u32, 160u32);
    let image = synthetic_radiograph(width, height);
    let landmarks = annotation(width, height);

    let predictor = LandmarkPredictor::new(
        OracleScorer {
            truth: landmarks.require_all().unwrap(),
            original_size: (width, height),
            resolution: 128,
        },
        PreprocessConfig {
            input_size: InputSize::new(128, 128),
            ..Default::default()
        },
    );

    let output = predictor
        .predict_image(&DynamicImage::ImageLuma8(image))
        .expect("prediction");
    assert_eq!(output.landmarks.len(), NUM_LANDMARKS);

    let samples: Vec<EvalSample> = output
        .landmarks
        .iter()
        .map(|(slot, prediction)| EvalSample {
            ground_truth: landmarks.get(*slot).unwrap(),
            predicted: prediction.point,
            landmark_index: *slot,
        })
        .collect();

    let report = evaluate(&samples, &[2.0, 4.0, 10.0, 20.0]).expect("report");
    // Peak snapping costs at most one output cell, under two original pixels.
    assert!(report.mre < 2.0, "mre too high: {}", report.mre);
    assert_eq!(report.sdr["sdr_4px"], 100.0);
    assert!(report
        .per_landmark_mre
        .values()
        .all(|entry| entry.is_some()));
}

#[test]
fn training_samples_feed_the_grid_the_scorer_expects() {
    let (width, height) = (200u32, 160u32);
    let image = synthetic_radiograph(width, height);
    let landmarks = annotation(width, height);
    let options = SampleOptions {
        preprocess: PreprocessConfig {
            input_size: InputSize::new(128, 128),
            ..Default::default()
        },
        sigma: 5.0,
        augment: Some(AugmentationConfig::default()),
    };

    let mut rng = StdRng::seed_from_u64(42);
    let sample =
        build_training_sample(&image, &landmarks, &options, &mut rng).expect("sample");

    assert_eq!(sample.input.shape(), &[128, 128]);
    assert_eq!(sample.targets.shape(), &[NUM_LANDMARKS, 128, 128]);
    assert!(sample.targets.iter().all(|v| *v >= 0.0));
    // Every target map carries a near-unit peak: augmentation clamped the
    // coordinates into bounds before encoding.
    for slot in 0..NUM_LANDMARKS {
        let peak = sample
            .targets
            .index_axis(Axis(0), slot)
            .iter()
            .fold(f32::NEG_INFINITY, |acc, v| acc.max(*v));
        assert!(peak > 0.9, "slot {} peak {}", slot + 1, peak);
    }
}

#[test]
fn fixture_annotation_round_trips_through_the_codec() {
    let coords: Vec<[f32; 2]> =
        load_fixture_json("annotations/sample_landmarks.json").expect("fixture");
    let points: Vec<Point> = coords.iter().map(|[x, y]| Point::new(*x, *y)).collect();
    let landmarks = LandmarkSet::from_points(&points).expect("full tracing");

    // The fixture tracing was taken on a 1935x2400 radiograph.
    let original = (1935u32, 2400u32);
    let grid = (64u32, 64u32);
    let stack = encode_stack(&landmarks, original, grid, 2.0).expect("stack");

    let cell_w = original.0 as f32 / grid.0 as f32;
    let cell_h = original.1 as f32 / grid.1 as f32;
    for slot in 1..=NUM_LANDMARKS {
        let peak = decode(stack.index_axis(Axis(0), slot - 1)).expect("decode");
        let back = rescale(peak.point, grid, original);
        let truth = landmarks.get(slot).unwrap();
        // Peak snapping loses at most one grid cell.
        assert!((back.x - truth.x).abs() <= cell_w, "slot {slot}: x {} vs {}", back.x, truth.x);
        assert!((back.y - truth.y).abs() <= cell_h, "slot {slot}: y {} vs {}", back.y, truth.y);
    }
}

#[test]
fn split_then_assemble_is_reproducible_across_runs() {
    let ids: Vec<String> = (0..20).map(|i| format!("ceph_{i:03}.bmp")).collect();
    let split_a = split_items(&ids, 0.70, 0.15, 42).expect("split");
    let split_b = split_items(&ids, 0.70, 0.15, 42).expect("split");
    assert_eq!(split_a, split_b);
    assert_eq!(split_a.train.len(), 14);
    assert_eq!(split_a.val.len(), 3);
    assert_eq!(split_a.test.len(), 3);

    // Re-assembling the same training item with the same per-item seed gives
    // identical tensors even when workers process the list in another order.
    let image = synthetic_radiograph(120, 120);
    let landmarks = annotation(120, 120);
    let options = SampleOptions {
        preprocess: PreprocessConfig {
            input_size: InputSize::new(64, 64),
            ..Default::default()
        },
        sigma: 3.0,
        augment: Some(AugmentationConfig::default()),
    };

    let first =
        build_training_sample(&image, &landmarks, &options, &mut StdRng::seed_from_u64(7))
            .expect("sample");
    let second =
        build_training_sample(&image, &landmarks, &options, &mut StdRng::seed_from_u64(7))
            .expect("sample");
    assert_eq!(first.input, second.input);
    assert_eq!(first.targets, second.targets);
}
