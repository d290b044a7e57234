use std::path::Path;

use anyhow::{Context, Result};
use image::{DynamicImage, GrayImage, imageops::FilterType};
use ndarray::Array2;

/// Load an image from disk into memory.
///
/// # Arguments
///
/// * `path` - The path to the image file.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path_ref = path.as_ref();
    image::open(path_ref).with_context(|| format!("failed to open image {}", path_ref.display()))
}

/// Resize an image to the requested resolution and convert it to grayscale.
///
/// X-ray sources are single-channel; color inputs are collapsed with the
/// standard luma weighting before the scoring function ever sees them.
///
/// # Arguments
///
/// * `image` - The image to resize.
/// * `width` - The target width.
/// * `height` - The target height.
/// * `filter` - The sampling filter to use for resizing.
pub fn resize_gray(image: &DynamicImage, width: u32, height: u32, filter: FilterType) -> GrayImage {
    image.resize_exact(width, height, filter).to_luma8()
}

/// Convert a grayscale image into a normalized `[0, 1]` row-major grid.
///
/// The resulting array is indexed `(row, col)`, matching the layout the
/// scoring function consumes and produces.
///
/// # Arguments
///
/// * `image` - The grayscale image to convert.
pub fn gray_to_grid(image: &GrayImage) -> Array2<f32> {
    let (width, height) = image.dimensions();
    let mut grid = Array2::<f32>::zeros((height as usize, width as usize));
    for (x, y, pixel) in image.enumerate_pixels() {
        grid[(y as usize, x as usize)] = pixel[0] as f32 / 255.0;
    }
    grid
}

/// Compute scale factors used to reproject grid coordinates to original space.
///
/// This is necessary when the scoring function runs on a resized version of
/// the original image.
///
/// # Arguments
///
/// * `original` - A tuple of the original image's (width, height).
/// * `target` - A tuple of the resized grid's (width, height).
pub fn compute_resize_scales(original: (u32, u32), target: (u32, u32)) -> Result<(f32, f32)> {
    let (orig_w, orig_h) = original;
    let (target_w, target_h) = target;
    anyhow::ensure!(
        target_w > 0 && target_h > 0,
        "target dimensions must be non-zero"
    );
    anyhow::ensure!(
        orig_w > 0 && orig_h > 0,
        "original dimensions must be non-zero"
    );
    Ok((
        orig_w as f32 / target_w as f32,
        orig_h as f32 / target_h as f32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn gray_to_grid_normalizes_and_transposes() {
        let mut image = GrayImage::new(3, 2);
        image.put_pixel(0, 0, Luma([0]));
        image.put_pixel(2, 0, Luma([255]));
        image.put_pixel(1, 1, Luma([51]));

        let grid = gray_to_grid(&image);
        assert_eq!(grid.shape(), &[2, 3]);
        assert_eq!(grid[(0, 0)], 0.0);
        assert_eq!(grid[(0, 2)], 1.0);
        assert!((grid[(1, 1)] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn resize_gray_collapses_channels() {
        let rgb = image::RgbImage::from_pixel(4, 4, image::Rgb([255, 0, 0]));
        let resized = resize_gray(&DynamicImage::ImageRgb8(rgb), 2, 2, FilterType::Nearest);
        assert_eq!(resized.dimensions(), (2, 2));
    }

    #[test]
    fn compute_resize_scales_returns_expected_values() {
        let (sx, sy) = compute_resize_scales((1935, 2400), (512, 512)).unwrap();
        assert!((sx - 1935.0 / 512.0).abs() < 1e-6);
        assert!((sy - 2400.0 / 512.0).abs() < 1e-6);
    }

    #[test]
    fn compute_resize_scales_rejects_zero() {
        assert!(compute_resize_scales((0, 480), (320, 240)).is_err());
        assert!(compute_resize_scales((640, 480), (0, 240)).is_err());
    }
}
