//! Capability interface for the trained scoring function.
//!
//! The scoring function itself (a trained U-Net in deployment) is an opaque
//! external collaborator: this crate only depends on the narrow contract of
//! "given a normalized grid, return one likelihood map per landmark slot".
//! Implementations wrap whatever runtime actually executes the model; tests
//! substitute a deterministic double.

use anyhow::Result;
use ndarray::{Array2, Array3};

/// Scores a normalized input grid into per-landmark likelihood maps.
///
/// Contract: the returned stack has shape `[NUM_LANDMARKS, rows, cols]` where
/// `rows`/`cols` are the model's output resolution (usually the input grid
/// size), every value is non-negative, and repeated calls on the same input
/// produce the same output. Implementations must not retain references to the
/// input grid.
pub trait HeatmapScorer: Send + Sync + std::fmt::Debug {
    /// Score one normalized `[0, 1]` grayscale grid.
    fn score(&self, grid: &Array2<f32>) -> Result<Array3<f32>>;
}

impl<'a, S: HeatmapScorer + ?Sized> HeatmapScorer for &'a S {
    fn score(&self, grid: &Array2<f32>) -> Result<Array3<f32>> {
        (**self).score(grid)
    }
}

impl<S: HeatmapScorer + ?Sized> HeatmapScorer for Box<S> {
    fn score(&self, grid: &Array2<f32>) -> Result<Array3<f32>> {
        (**self).score(grid)
    }
}
