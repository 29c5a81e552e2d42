//! # Grid Axes
//!
//! One-dimensional coordinate arrays of a gridded dataset (a weather cutout
//! or an eligibility mask) and the lookups the diagnostics run on them:
//! extent, mean cell spacing, and nearest grid cell to a point.

use crate::bounds::{BoundingBox, MalformedBoundsError};
use serde::{Deserialize, Serialize};

/// Index of the value closest to `target` by absolute difference.
///
/// Ties resolve to the first index. Non-finite coordinates are ignored;
/// `None` is returned when no finite coordinate exists.
pub fn nearest_index(coords: &[f64], target: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (idx, &c) in coords.iter().enumerate() {
        if !c.is_finite() {
            continue;
        }
        let dist = (c - target).abs();
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }
    best.map(|(idx, _)| idx)
}

fn finite_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .filter(|v| v.is_finite())
        .fold(None, |acc, &v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn mean_spacing(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let steps: Vec<f64> = values
        .windows(2)
        .map(|w| (w[1] - w[0]).abs())
        .filter(|d| d.is_finite())
        .collect();
    if steps.is_empty() {
        return None;
    }
    Some(steps.iter().sum::<f64>() / steps.len() as f64)
}

/// Cell of a grid nearest to a probed point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridCell {
    /// Index along the y axis.
    pub row: usize,
    /// Index along the x axis.
    pub col: usize,
    /// Cell-centre x coordinate.
    pub x: f64,
    /// Cell-centre y coordinate.
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridAxes {
    x: Vec<f64>,
    y: Vec<f64>,
    extent: BoundingBox,
}

impl GridAxes {
    /// Builds grid axes from x and y coordinate arrays.
    ///
    /// # Errors
    ///
    /// Fails with [`MalformedBoundsError::NoCoordinates`] if either axis has
    /// no finite value.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, MalformedBoundsError> {
        let (min_x, max_x) = finite_range(&x).ok_or(MalformedBoundsError::NoCoordinates)?;
        let (min_y, max_y) = finite_range(&y).ok_or(MalformedBoundsError::NoCoordinates)?;
        let extent = BoundingBox::try_new(min_x, min_y, max_x, max_y)?;
        Ok(GridAxes { x, y, extent })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    /// Extent spanned by the cell-centre coordinates.
    pub fn extent(&self) -> BoundingBox {
        self.extent
    }

    /// `(rows, cols)`, i.e. `(len(y), len(x))`.
    pub fn shape(&self) -> (usize, usize) {
        (self.y.len(), self.x.len())
    }

    pub fn cell_count(&self) -> usize {
        self.x.len() * self.y.len()
    }

    /// Mean absolute spacing `(dx, dy)`; `None` if an axis has fewer than
    /// two coordinates.
    pub fn resolution(&self) -> Option<(f64, f64)> {
        Some((mean_spacing(&self.x)?, mean_spacing(&self.y)?))
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.extent.contains_point(x, y)
    }

    /// Nearest grid cell to `(x, y)`, or `None` when the point lies outside
    /// the grid extent.
    pub fn nearest_cell(&self, x: f64, y: f64) -> Option<GridCell> {
        if !self.contains(x, y) {
            return None;
        }
        let col = nearest_index(&self.x, x)?;
        let row = nearest_index(&self.y, y)?;
        Some(GridCell {
            row,
            col,
            x: self.x[col],
            y: self.y[row],
        })
    }
}
