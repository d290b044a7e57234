//! Landmark data model shared by the encoding, augmentation, and evaluation
//! stages.
//!
//! A cephalometric tracing locates [`NUM_LANDMARKS`] anatomical points per
//! radiograph. Annotations arrive partially complete, so a [`LandmarkSet`]
//! stores an optional [`Point`] per slot and callers decide how to handle
//! gaps; this module never invents a coordinate for a missing slot.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of landmark positions traced per radiograph.
pub const NUM_LANDMARKS: usize = 19;

/// Display names for the landmark slots, indexed 1..=[`NUM_LANDMARKS`].
pub const LANDMARK_NAMES: [&str; NUM_LANDMARKS] = [
    "S (Sella)",
    "N (Nasion)",
    "Or (Orbitale)",
    "Po (Porion)",
    "A (Subspinale)",
    "B (Supramentale)",
    "Pog (Pogonion)",
    "Gn (Gnathion)",
    "Me (Menton)",
    "Go (Gonion)",
    "ANS",
    "PNS",
    "U1 (Upper Incisor)",
    "U1R (Upper Incisor Root)",
    "L1 (Lower Incisor)",
    "L1R (Lower Incisor Root)",
    "U6 (Upper Molar)",
    "L6 (Lower Molar)",
    "Ar (Articulare)",
];

/// Returns the display name for a 1-indexed landmark slot.
pub fn landmark_name(index: usize) -> Option<&'static str> {
    if (1..=NUM_LANDMARKS).contains(&index) {
        Some(LANDMARK_NAMES[index - 1])
    } else {
        None
    }
}

/// Landmark coordinate (x, y) in the pixel space of a declared frame.
///
/// A point is only meaningful relative to the width/height it was measured
/// against (original radiograph or the model grid); convert between frames
/// with [`crate::heatmap::rescale`] rather than mixing them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// The x-coordinate of the landmark.
    pub x: f32,
    /// The y-coordinate of the landmark.
    pub y: f32,
}

impl Point {
    /// Creates a new `Point`.
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point in the same frame.
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Errors raised when a landmark slot cannot be resolved.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkError {
    /// The slot exists but has no annotated coordinate.
    #[error("landmark {index} is not annotated")]
    Missing { index: usize },
    /// The requested index is outside the 1-indexed slot range.
    #[error("landmark index {index} is outside 1..={max}", max = NUM_LANDMARKS)]
    IndexOutOfRange { index: usize },
}

/// Ordered, fixed-length set of optional landmark coordinates.
///
/// Slots are addressed with 1-based indices to match the annotation tooling
/// and the trained scoring function's channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkSet {
    slots: Vec<Option<Point>>,
}

impl Default for LandmarkSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl LandmarkSet {
    /// Creates a set with every slot unannotated.
    pub fn empty() -> Self {
        Self {
            slots: vec![None; NUM_LANDMARKS],
        }
    }

    /// Builds a fully-annotated set from exactly [`NUM_LANDMARKS`] points in
    /// slot order.
    pub fn from_points(points: &[Point]) -> Result<Self, LandmarkError> {
        if points.len() != NUM_LANDMARKS {
            return Err(LandmarkError::IndexOutOfRange {
                index: points.len(),
            });
        }
        Ok(Self {
            slots: points.iter().copied().map(Some).collect(),
        })
    }

    /// Returns the coordinate for a 1-indexed slot.
    pub fn get(&self, index: usize) -> Result<Point, LandmarkError> {
        if !(1..=NUM_LANDMARKS).contains(&index) {
            return Err(LandmarkError::IndexOutOfRange { index });
        }
        self.slots[index - 1].ok_or(LandmarkError::Missing { index })
    }

    /// Stores (or clears) the coordinate for a 1-indexed slot.
    pub fn set(&mut self, index: usize, point: Option<Point>) -> Result<(), LandmarkError> {
        if !(1..=NUM_LANDMARKS).contains(&index) {
            return Err(LandmarkError::IndexOutOfRange { index });
        }
        self.slots[index - 1] = point;
        Ok(())
    }

    /// Number of annotated slots.
    pub fn annotated_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    /// `true` when every slot carries a coordinate.
    pub fn is_fully_annotated(&self) -> bool {
        self.annotated_count() == NUM_LANDMARKS
    }

    /// Iterate over `(1-indexed slot, optional point)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, Option<Point>)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| (idx + 1, *slot))
    }

    /// Collects every annotated coordinate in slot order, failing on the
    /// first gap.
    pub fn require_all(&self) -> Result<Vec<Point>, LandmarkError> {
        self.slots
            .iter()
            .enumerate()
            .map(|(idx, slot)| slot.ok_or(LandmarkError::Missing { index: idx + 1 }))
            .collect()
    }
}
