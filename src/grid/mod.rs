//! Sampling grids for the subspace heatmaps.
//!
//! A grid covers the dataset range of both subspace dimensions plus one
//! extra cell on every side, so contour interpolation has support at the
//! edges. Raw grids live in dataset units; normalized grids map them into
//! `[0, 1]` with the dataset's normalize factors.

pub mod align;

pub use align::{align_number, DECIMAL_PLACES, MAX_DIGITS};

use crate::models::{Dataset, Grid};

/// Normalized values below this are stored as zero.
pub const NORMALIZED_EPSILON: f64 = 1e-16;

/// Builds the `(resolution + 3)²` sampling grid for every subspace.
///
/// Returns `None` for a zero resolution or a subspace dimension the dataset
/// does not have. Points are ordered x-major.
pub fn transform_subspace_grids(
    resolution: usize,
    subspaces: &[[usize; 2]],
    dataset: &Dataset,
) -> Option<Vec<Grid>> {
    if resolution == 0 {
        return None;
    }

    let steps = resolution + 2;
    let mut grids = Vec::with_capacity(subspaces.len());
    for subspace in subspaces {
        let [min_x, max_x] = dataset.factor(subspace[0])?;
        let [min_y, max_y] = dataset.factor(subspace[1])?;
        let scale_x = (max_x - min_x) / resolution as f64;
        let scale_y = (max_y - min_y) / resolution as f64;

        let mut grid = Vec::with_capacity((steps + 1) * (steps + 1));
        // Coordinates accumulate step by step; persisted grids were built
        // the same way and must compare equal.
        let mut x = min_x - scale_x;
        for _ in 0..=steps {
            let mut y = min_y - scale_y;
            for _ in 0..=steps {
                grid.push([align_number(x), align_number(y)]);
                y += scale_y;
            }
            x += scale_x;
        }
        grids.push(grid);
    }
    Some(grids)
}

/// Maps one coordinate into `[0, 1]` for the factor `[min, max]`.
pub fn normalize_value(value: f64, min: f64, max: f64) -> f64 {
    if max == min {
        return 1.0;
    }
    let normalized = align_number(((value - min) / (max - min)).clamp(0.0, 1.0));
    if normalized < NORMALIZED_EPSILON {
        0.0
    } else {
        normalized
    }
}

/// Normalizes raw grids with the factors of `dataset`.
///
/// `None` when the dataset is unavailable, the grids do not line up with
/// `subspaces`, or a dimension is unknown.
pub fn normalize_subspace_grids(
    grids: &[Grid],
    subspaces: &[[usize; 2]],
    dataset: Option<&Dataset>,
) -> Option<Vec<Grid>> {
    let dataset = dataset?;
    if grids.len() != subspaces.len() {
        return None;
    }

    grids
        .iter()
        .zip(subspaces)
        .map(|(grid, subspace)| {
            let [min_x, max_x] = dataset.factor(subspace[0])?;
            let [min_y, max_y] = dataset.factor(subspace[1])?;
            Some(
                grid.iter()
                    .map(|[x, y]| [normalize_value(*x, min_x, max_x), normalize_value(*y, min_y, max_y)])
                    .collect(),
            )
        })
        .collect()
}
