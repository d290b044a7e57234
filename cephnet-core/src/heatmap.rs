//! Gaussian heatmap codec.
//!
//! The scoring function regresses one dense likelihood map per landmark slot.
//! This module converts between sparse coordinates and those maps: `encode`
//! produces a training target with a unit peak at the annotated location,
//! `decode` recovers the peak cell (and its value as confidence) from a
//! scored map, and `rescale` moves coordinates between pixel frames.

use ndarray::{Array2, Array3, ArrayView2};
use thiserror::Error;

use crate::landmarks::{LandmarkError, LandmarkSet, NUM_LANDMARKS, Point};

/// Errors raised when a scored map cannot be decoded.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum HeatmapError {
    /// The map contains a NaN or infinite value and has no comparable peak.
    #[error("heatmap value at row {row}, col {col} is not finite")]
    NonFinite { row: usize, col: usize },
    /// The map has zero area.
    #[error("heatmap has zero area ({rows}x{cols})")]
    EmptyGrid { rows: usize, cols: usize },
}

/// Peak extracted from a scored map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedPeak {
    /// Integer cell (column, row) of the maximum, as grid-space coordinates.
    pub point: Point,
    /// Value of the maximum cell.
    pub confidence: f32,
}

/// Encode a coordinate into a `height` x `width` Gaussian target map.
///
/// Cell `(col, row)` holds `exp(-((col - x)^2 + (row - y)^2) / (2 sigma^2))`.
/// No clamping is applied: a coordinate outside the grid still yields
/// well-defined (small or zero) values everywhere, so callers that need
/// bounded targets must clamp before encoding. When the coordinate lies
/// inside the grid the nearest cell holds a value of 1.
///
/// # Arguments
///
/// * `point` - The coordinate in grid space.
/// * `width` - Number of grid columns.
/// * `height` - Number of grid rows.
/// * `sigma` - Positive Gaussian spread in grid pixels.
pub fn encode(point: Point, width: usize, height: usize, sigma: f32) -> Array2<f32> {
    debug_assert!(sigma > 0.0, "sigma must be positive");
    let denom = 2.0 * sigma * sigma;
    Array2::from_shape_fn((height, width), |(row, col)| {
        let dx = col as f32 - point.x;
        let dy = row as f32 - point.y;
        (-(dx * dx + dy * dy) / denom).exp()
    })
}

/// Decode a scored map into its peak cell and confidence.
///
/// The maximum is found by exhaustive row-major scan; on ties the first cell
/// encountered (lowest row, then lowest column) wins. That tie-break is part
/// of the contract: flat regions must decode identically across runs.
pub fn decode(map: ArrayView2<'_, f32>) -> Result<DecodedPeak, HeatmapError> {
    let (rows, cols) = map.dim();
    if rows == 0 || cols == 0 {
        return Err(HeatmapError::EmptyGrid { rows, cols });
    }

    let mut best = f32::NEG_INFINITY;
    let mut best_cell = (0usize, 0usize);
    for row in 0..rows {
        for col in 0..cols {
            let value = map[(row, col)];
            if !value.is_finite() {
                return Err(HeatmapError::NonFinite { row, col });
            }
            // Strict comparison keeps the earliest row-major maximum.
            if value > best {
                best = value;
                best_cell = (row, col);
            }
        }
    }

    Ok(DecodedPeak {
        point: Point::new(best_cell.1 as f32, best_cell.0 as f32),
        confidence: best,
    })
}

/// Rescale a coordinate between two pixel frames.
///
/// Each axis is scaled independently: `x' = x / from_w * to_w` and
/// `y' = y / from_h * to_h`. Used to map decoded grid-space peaks back to the
/// original radiograph, and annotations into the model grid.
///
/// # Arguments
///
/// * `point` - The coordinate in the source frame.
/// * `from_size` - The source frame's (width, height).
/// * `to_size` - The destination frame's (width, height).
pub fn rescale(point: Point, from_size: (u32, u32), to_size: (u32, u32)) -> Point {
    Point::new(
        point.x / from_size.0 as f32 * to_size.0 as f32,
        point.y / from_size.1 as f32 * to_size.1 as f32,
    )
}

/// Encode every slot of a landmark set into a `[NUM_LANDMARKS, height, width]`
/// target stack, rescaling coordinates from the original frame into the grid.
///
/// Fails with [`LandmarkError::Missing`] on the first unannotated slot; the
/// caller decides whether to skip or mask such samples.
///
/// # Arguments
///
/// * `landmarks` - The annotated set in original pixel space.
/// * `original_size` - The original radiograph's (width, height).
/// * `grid_size` - The target grid's (width, height).
/// * `sigma` - Positive Gaussian spread in grid pixels.
pub fn encode_stack(
    landmarks: &LandmarkSet,
    original_size: (u32, u32),
    grid_size: (u32, u32),
    sigma: f32,
) -> Result<Array3<f32>, LandmarkError> {
    let (grid_w, grid_h) = (grid_size.0 as usize, grid_size.1 as usize);
    let mut stack = Array3::<f32>::zeros((NUM_LANDMARKS, grid_h, grid_w));
    for index in 1..=NUM_LANDMARKS {
        let point = landmarks.get(index)?;
        let scaled = rescale(point, original_size, grid_size);
        let map = encode(scaled, grid_w, grid_h, sigma);
        stack.index_axis_mut(ndarray::Axis(0), index - 1).assign(&map);
    }
    Ok(stack)
}
