//! Randomized training-time augmentation.
//!
//! Applies a fixed, ordered chain of geometric and photometric transforms to
//! an (image, landmark) pair while keeping the two consistent. Every step is
//! pure: it consumes borrowed inputs and returns fresh values, so samples
//! sharing a cached source image never alias. All randomness comes from the
//! caller-supplied generator, and parameters are drawn in a fixed order so a
//! seeded run reproduces bit-identically.
//!
//! Step order: rotation, scale, brightness, contrast, horizontal flip, and a
//! final unconditional clamp of landmark coordinates into the image bounds.

use image::{GrayImage, Luma, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use rand::Rng;

use cephnet_utils::config::AugmentationSettings;

use crate::landmarks::Point;

/// Immutable parameter set for one augmentation policy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentationConfig {
    /// Maximum absolute rotation in degrees; 0 disables the step.
    pub rotation_range: f32,
    /// Minimum and maximum scale factor; (1, 1) disables the step.
    pub scale_range: (f32, f32),
    /// Minimum and maximum brightness multiplier; (1, 1) disables the step.
    pub brightness_range: (f32, f32),
    /// Minimum and maximum contrast multiplier; (1, 1) disables the step.
    pub contrast_range: (f32, f32),
    /// Probability of mirroring the image left-right.
    pub horizontal_flip_prob: f32,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 10.0,
            scale_range: (0.9, 1.1),
            brightness_range: (0.85, 1.15),
            contrast_range: (0.85, 1.15),
            horizontal_flip_prob: 0.5,
        }
    }
}

impl From<AugmentationSettings> for AugmentationConfig {
    fn from(settings: AugmentationSettings) -> Self {
        AugmentationConfig {
            rotation_range: settings.rotation_range,
            scale_range: settings.scale_range,
            brightness_range: settings.brightness_range,
            contrast_range: settings.contrast_range,
            horizontal_flip_prob: settings.horizontal_flip_prob,
        }
    }
}

impl From<&AugmentationSettings> for AugmentationConfig {
    fn from(settings: &AugmentationSettings) -> Self {
        (*settings).into()
    }
}

/// Apply the augmentation chain to an image and its landmarks.
///
/// Draw order is fixed: angle (when `rotation_range > 0`), scale factor, then
/// brightness and contrast factors (each when its range is not `(1, 1)`), then
/// one uniform draw for the flip decision on every call. Disabled steps
/// consume no draw.
///
/// The output image keeps the input dimensions; landmark coordinates are
/// clamped into `[0, width - 1] x [0, height - 1]` before returning.
///
/// # Arguments
///
/// * `image` - The grayscale source image.
/// * `landmarks` - Landmark coordinates in the image's pixel frame.
/// * `config` - The augmentation policy.
/// * `rng` - Caller-owned generator; seed per worker for reproducibility.
pub fn apply<R: Rng>(
    image: &GrayImage,
    landmarks: &[Point],
    config: &AugmentationConfig,
    rng: &mut R,
) -> (GrayImage, Vec<Point>) {
    let mut img = image.clone();
    let mut points = landmarks.to_vec();

    if config.rotation_range > 0.0 {
        let angle = uniform(rng, (-config.rotation_range, config.rotation_range));
        let rotated = rotate_step(&img, &points, angle);
        img = rotated.0;
        points = rotated.1;
    }

    if config.scale_range != (1.0, 1.0) {
        let factor = uniform(rng, config.scale_range);
        let scaled = scale_step(&img, &points, factor);
        img = scaled.0;
        points = scaled.1;
    }

    if config.brightness_range != (1.0, 1.0) {
        let factor = uniform(rng, config.brightness_range);
        img = brightness_step(&img, factor);
    }

    if config.contrast_range != (1.0, 1.0) {
        let factor = uniform(rng, config.contrast_range);
        img = contrast_step(&img, factor);
    }

    // The flip draw always happens so the stream position stays aligned
    // across samples regardless of the outcome.
    let draw: f32 = rng.gen();
    if draw < config.horizontal_flip_prob {
        let flipped = flip_step(&img, &points);
        img = flipped.0;
        points = flipped.1;
    }

    let points = clamp_points(&points, img.dimensions());

    (img, points)
}

/// Uniform draw over `[lo, hi)` as `lo + (hi - lo) * t`.
///
/// Consumes exactly one value from the stream whatever the range, so a
/// degenerate range still keeps seeded runs aligned.
fn uniform<R: Rng>(rng: &mut R, range: (f32, f32)) -> f32 {
    let t: f32 = rng.gen();
    range.0 + (range.1 - range.0) * t
}

/// Rotate the image counter-clockwise by `angle` degrees about its center and
/// move the landmarks with it.
///
/// Point rotation uses the negated angle: the rasterizer maps destination
/// pixels through the inverse transform, so the coordinates must turn the
/// opposite way to stay on the same anatomy. The sign convention is load
/// bearing; any trained artifact is calibrated against it.
fn rotate_step(image: &GrayImage, points: &[Point], angle: f32) -> (GrayImage, Vec<Point>) {
    // rotate_about_center is clockwise-positive; negate for counter-clockwise.
    let rotated = rotate_about_center(
        image,
        -angle.to_radians(),
        Interpolation::Bilinear,
        Luma([0u8]),
    );

    let (width, height) = image.dimensions();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let rad = (-angle).to_radians();
    let (sin_a, cos_a) = rad.sin_cos();
    let moved = points
        .iter()
        .map(|p| {
            Point::new(
                cos_a * (p.x - cx) - sin_a * (p.y - cy) + cx,
                sin_a * (p.x - cx) + cos_a * (p.y - cy) + cy,
            )
        })
        .collect();

    (rotated, moved)
}

/// Resize by `factor`, then restore the original canvas: center-crop when
/// zoomed in, center-pad onto a zero background when zoomed out.
fn scale_step(image: &GrayImage, points: &[Point], factor: f32) -> (GrayImage, Vec<Point>) {
    let (width, height) = image.dimensions();
    // Truncating resize; degenerate factors still keep a pixel.
    let new_w = ((width as f32 * factor) as u32).max(1);
    let new_h = ((height as f32 * factor) as u32).max(1);
    let resized = imageops::resize(image, new_w, new_h, imageops::FilterType::Lanczos3);

    if factor > 1.0 {
        let left = (new_w - width) / 2;
        let top = (new_h - height) / 2;
        let cropped = imageops::crop_imm(&resized, left, top, width, height).to_image();
        let moved = points
            .iter()
            .map(|p| Point::new(p.x * factor - left as f32, p.y * factor - top as f32))
            .collect();
        (cropped, moved)
    } else {
        let mut canvas = GrayImage::from_pixel(width, height, Luma([0u8]));
        let left = (width - new_w) / 2;
        let top = (height - new_h) / 2;
        imageops::replace(&mut canvas, &resized, left as i64, top as i64);
        let moved = points
            .iter()
            .map(|p| Point::new(p.x * factor + left as f32, p.y * factor + top as f32))
            .collect();
        (canvas, moved)
    }
}

/// Multiply pixel intensities by `factor`. Landmarks are unaffected.
fn brightness_step(image: &GrayImage, factor: f32) -> GrayImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        pixel[0] = (pixel[0] as f32 * factor).round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Blend each pixel towards the image mean: `v' = mean + (v - mean) * factor`.
///
/// The mean is rounded to the nearest integer level before blending; trained
/// artifacts are calibrated against that quantization.
fn contrast_step(image: &GrayImage, factor: f32) -> GrayImage {
    let count = image.as_raw().len();
    if count == 0 {
        return image.clone();
    }
    let total: u64 = image.as_raw().iter().map(|v| *v as u64).sum();
    let mean = (total as f64 / count as f64 + 0.5).floor() as f32;

    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let blended = mean + (pixel[0] as f32 - mean) * factor;
        pixel[0] = blended.round().clamp(0.0, 255.0) as u8;
    }
    out
}

/// Mirror the image left-right and map `x` to `width - x`.
///
/// The coordinate mapping intentionally omits the `- 1` of the usual
/// pixel-index mirror; the trained scoring function is calibrated against
/// this convention, so it must not be "corrected" here.
fn flip_step(image: &GrayImage, points: &[Point]) -> (GrayImage, Vec<Point>) {
    let flipped = imageops::flip_horizontal(image);
    let width = image.width() as f32;
    let moved = points
        .iter()
        .map(|p| Point::new(width - p.x, p.y))
        .collect();
    (flipped, moved)
}

/// Clamp every coordinate into `[0, width - 1] x [0, height - 1]`.
fn clamp_points(points: &[Point], dimensions: (u32, u32)) -> Vec<Point> {
    let max_x = (dimensions.0.saturating_sub(1)) as f32;
    let max_y = (dimensions.1.saturating_sub(1)) as f32;
    points
        .iter()
        .map(|p| Point::new(p.x.clamp(0.0, max_x), p.y.clamp(0.0, max_y)))
        .collect()
}
