//! Deterministic train/val/test partitioning.
//!
//! Items are shuffled with a generator seeded from a caller-supplied value,
//! then cut into three contiguous blocks. The same seed and input order
//! always produce the same partition, so exports and training runs can be
//! reproduced exactly.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use thiserror::Error;

use cephnet_utils::config::SplitSettings;

/// Errors raised when a partition cannot be formed.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SplitError {
    /// Fewer than three items; a three-way split is not meaningful and the
    /// caller should fall back to a single undivided group.
    #[error("cannot split {count} item(s) into train/val/test; need at least 3")]
    TooFewItems { count: usize },
    /// Ratios are non-finite, outside [0, 1], or sum past 1.
    #[error("split ratios must each lie in [0, 1] and sum to at most 1")]
    InvalidRatios,
}

/// A three-way partition of item identifiers.
///
/// The three subsets are pairwise disjoint and their concatenation is a
/// permutation of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit<T> {
    /// Training subset: the first `floor(n * train_ratio)` shuffled items.
    pub train: Vec<T>,
    /// Validation subset: the next `floor(n * val_ratio)` shuffled items.
    pub val: Vec<T>,
    /// Test subset: the remainder, absorbing the rounding.
    pub test: Vec<T>,
}

impl<T> DatasetSplit<T> {
    /// Total number of items across all three subsets.
    pub fn len(&self) -> usize {
        self.train.len() + self.val.len() + self.test.len()
    }

    /// `true` when every subset is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Partition `items` into train/val/test subsets.
///
/// The shuffle permutation is derived solely from `seed` and the input
/// order. `n_train = floor(n * train_ratio)`, `n_val = floor(n * val_ratio)`,
/// and the test subset takes the remainder. Filtering items (for example by
/// annotation completeness) is the caller's responsibility and must happen
/// before splitting.
///
/// # Arguments
///
/// * `items` - The identifiers to partition.
/// * `train_ratio` - Fraction assigned to the training subset.
/// * `val_ratio` - Fraction assigned to the validation subset.
/// * `seed` - Seed for the shuffle permutation.
pub fn split_items<T: Clone>(
    items: &[T],
    train_ratio: f64,
    val_ratio: f64,
    seed: u64,
) -> Result<DatasetSplit<T>, SplitError> {
    let ratio_valid = |r: f64| r.is_finite() && (0.0..=1.0).contains(&r);
    if !ratio_valid(train_ratio) || !ratio_valid(val_ratio) || train_ratio + val_ratio > 1.0 {
        return Err(SplitError::InvalidRatios);
    }

    let n = items.len();
    if n < 3 {
        return Err(SplitError::TooFewItems { count: n });
    }

    let mut shuffled = items.to_vec();
    let mut rng = StdRng::seed_from_u64(seed);
    shuffled.shuffle(&mut rng);

    let n_train = (n as f64 * train_ratio).floor() as usize;
    let n_val = (n as f64 * val_ratio).floor() as usize;

    let test = shuffled.split_off(n_train + n_val);
    let val = shuffled.split_off(n_train);
    let train = shuffled;

    Ok(DatasetSplit { train, val, test })
}

/// Partition using persisted [`SplitSettings`].
pub fn split_with_settings<T: Clone>(
    items: &[T],
    settings: &SplitSettings,
) -> Result<DatasetSplit<T>, SplitError> {
    split_items(items, settings.train_ratio, settings.val_ratio, settings.seed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("img_{i:03}.bmp")).collect()
    }

    #[test]
    fn split_is_deterministic_for_a_seed() {
        let items = ids(10);
        let first = split_items(&items, 0.70, 0.15, 42).expect("split");
        let second = split_items(&items, 0.70, 0.15, 42).expect("split");
        assert_eq!(first, second);

        assert_eq!(first.train.len(), 7);
        assert_eq!(first.val.len(), 1);
        assert_eq!(first.test.len(), 2);
    }

    #[test]
    fn different_seeds_permute_differently() {
        let items = ids(40);
        let a = split_items(&items, 0.70, 0.15, 42).expect("split");
        let b = split_items(&items, 0.70, 0.15, 43).expect("split");
        assert_ne!(a.train, b.train);
    }

    #[test]
    fn subsets_are_disjoint_and_cover_the_input() {
        let items = ids(23);
        let split = split_items(&items, 0.70, 0.15, 7).expect("split");

        let mut seen = BTreeSet::new();
        for id in split
            .train
            .iter()
            .chain(&split.val)
            .chain(&split.test)
        {
            assert!(seen.insert(id.clone()), "duplicate id {id}");
        }
        assert_eq!(seen, items.iter().cloned().collect::<BTreeSet<_>>());
        assert_eq!(split.len(), items.len());
    }

    #[test]
    fn too_few_items_are_rejected() {
        for n in 0..3 {
            let items = ids(n);
            assert_eq!(
                split_items(&items, 0.70, 0.15, 42),
                Err(SplitError::TooFewItems { count: n })
            );
        }
    }

    #[test]
    fn invalid_ratios_are_rejected() {
        let items = ids(10);
        assert_eq!(
            split_items(&items, 0.9, 0.2, 42),
            Err(SplitError::InvalidRatios)
        );
        assert_eq!(
            split_items(&items, -0.1, 0.5, 42),
            Err(SplitError::InvalidRatios)
        );
        assert_eq!(
            split_items(&items, f64::NAN, 0.5, 42),
            Err(SplitError::InvalidRatios)
        );
    }

    #[test]
    fn settings_wrapper_uses_configured_values() {
        let items = ids(10);
        let settings = SplitSettings::default();
        let direct = split_items(&items, 0.70, 0.15, 42).expect("split");
        let via_settings = split_with_settings(&items, &settings).expect("split");
        assert_eq!(direct, via_settings);
    }
}
