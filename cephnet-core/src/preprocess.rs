//! Preprocessing utilities for preparing radiographs for the scoring function.
//!
//! The helpers in this module convert images to grayscale, resize them to the
//! model grid, normalize intensities into `[0, 1]`, and return the scale
//! factors necessary to map decoded peaks back to the source image.

use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, imageops::FilterType};
use ndarray::Array2;

use cephnet_utils::config::{InputDimensions, ResizeQuality};
use cephnet_utils::telemetry::timing_guard;
use cephnet_utils::{compute_resize_scales, gray_to_grid, load_image, resize_gray};

/// Desired input resolution for the scoring function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputSize {
    /// The width of the input grid.
    pub width: u32,
    /// The height of the input grid.
    pub height: u32,
}

impl InputSize {
    /// Creates a new `InputSize`.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self {
            width: 512,
            height: 512,
        }
    }
}

/// Configuration for preprocessing an image before scoring.
#[derive(Debug, Clone, Default)]
pub struct PreprocessConfig {
    /// The target grid size for the scoring function.
    pub input_size: InputSize,
    /// Resize filter preference controlling the quality vs speed trade-off.
    pub resize_quality: ResizeQuality,
}

impl PreprocessConfig {
    fn resize_filter(&self) -> FilterType {
        match self.resize_quality {
            ResizeQuality::Quality => FilterType::Lanczos3,
            ResizeQuality::Speed => FilterType::Nearest,
        }
    }
}

/// Output of preprocessing: normalized grid plus metadata for rescaling peaks.
#[derive(Debug)]
pub struct PreprocessOutput {
    /// Normalized `[0, 1]` grayscale grid, indexed `(row, col)`.
    pub grid: Array2<f32>,
    /// The horizontal scale factor to convert grid coordinates to the original image space.
    pub scale_x: f32,
    /// The vertical scale factor to convert grid coordinates to the original image space.
    pub scale_y: f32,
    /// The original dimensions of the input image.
    pub original_size: (u32, u32),
}

/// Preprocess an image file into a scoring-ready grid.
///
/// # Arguments
///
/// * `path` - The path to the image file.
/// * `config` - The configuration for preprocessing.
pub fn preprocess_image<P: AsRef<Path>>(
    path: P,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    let _guard = timing_guard("cephnet_core::preprocess_image", log::Level::Debug);
    let path_ref = path.as_ref();
    anyhow::ensure!(
        path_ref.exists(),
        "input image does not exist: {}",
        path_ref.display()
    );

    let image = load_image(path_ref)
        .with_context(|| format!("failed to load image from {}", path_ref.display()))?;
    preprocess_dynamic_image(&image, config)
}

/// Preprocess an in-memory image.
///
/// # Arguments
///
/// * `image` - The dynamic image to process.
/// * `config` - The configuration for preprocessing.
pub fn preprocess_dynamic_image(
    image: &DynamicImage,
    config: &PreprocessConfig,
) -> Result<PreprocessOutput> {
    let _guard = timing_guard("cephnet_core::preprocess_dynamic_image", log::Level::Trace);
    let input_w = config.input_size.width;
    let input_h = config.input_size.height;
    anyhow::ensure!(
        input_w > 0 && input_h > 0,
        "input dimensions must be greater than zero"
    );

    let (orig_w, orig_h) = (image.width(), image.height());
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "source image dimensions must be greater than zero"
    );

    let gray = resize_gray(image, input_w, input_h, config.resize_filter());
    let grid = gray_to_grid(&gray);

    let (scale_x, scale_y) = compute_resize_scales((orig_w, orig_h), (input_w, input_h))?;

    Ok(PreprocessOutput {
        grid,
        scale_x,
        scale_y,
        original_size: (orig_w, orig_h),
    })
}

impl From<InputDimensions> for InputSize {
    fn from(dimensions: InputDimensions) -> Self {
        InputSize::new(dimensions.width, dimensions.height)
    }
}

impl From<&InputDimensions> for InputSize {
    fn from(dimensions: &InputDimensions) -> Self {
        (*dimensions).into()
    }
}

impl From<InputDimensions> for PreprocessConfig {
    fn from(dimensions: InputDimensions) -> Self {
        let InputDimensions {
            width,
            height,
            resize_quality,
        } = dimensions;
        PreprocessConfig {
            input_size: InputSize::new(width, height),
            resize_quality,
        }
    }
}

impl From<&InputDimensions> for PreprocessConfig {
    fn from(dimensions: &InputDimensions) -> Self {
        PreprocessConfig {
            input_size: (*dimensions).into(),
            resize_quality: dimensions.resize_quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn preprocess_generates_normalized_grid() {
        let gray = GrayImage::from_fn(8, 8, |x, y| Luma([((x + y) * 16) as u8]));
        let dynamic = DynamicImage::ImageLuma8(gray);
        let config = PreprocessConfig {
            input_size: InputSize::new(4, 4),
            resize_quality: ResizeQuality::Speed,
        };

        let output =
            preprocess_dynamic_image(&dynamic, &config).expect("preprocess should succeed");

        assert_eq!(output.original_size, (8, 8));
        assert_eq!(output.scale_x, 2.0);
        assert_eq!(output.scale_y, 2.0);
        assert_eq!(output.grid.shape(), &[4, 4]);
        assert!(output.grid.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn preprocess_rejects_zero_input_dimensions() {
        let dynamic = DynamicImage::ImageLuma8(GrayImage::new(4, 4));
        let config = PreprocessConfig {
            input_size: InputSize::new(0, 4),
            ..Default::default()
        };
        assert!(preprocess_dynamic_image(&dynamic, &config).is_err());
    }

    #[test]
    fn converts_dimensions_into_configs() {
        let dims = InputDimensions {
            width: 320,
            height: 240,
            resize_quality: ResizeQuality::Quality,
        };

        let size: InputSize = dims.into();
        assert_eq!(size.width, 320);
        assert_eq!(size.height, 240);

        let config: PreprocessConfig = dims.into();
        assert_eq!(config.input_size.width, 320);
        assert_eq!(config.input_size.height, 240);
        assert_eq!(config.resize_quality, ResizeQuality::Quality);
    }
}
