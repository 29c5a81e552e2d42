//! # Bounds Reconciliation
//!
//! Pure functions comparing two axis-aligned bounding boxes: a *reference*
//! extent (typically an administrative boundary) and a *candidate* extent
//! (typically a raster or weather-grid domain).
//!
//! ## Operations
//!
//! - [`overlaps`] / [`overlap_axes`]: do the two boxes share at least one point?
//! - [`contains_with_margin`]: does the candidate extend at least a margin
//!   beyond the reference on every edge, and if not, which edges fall short?
//! - [`validate_box`]: reject inverted or non-finite extents before use.
//!
//! Both operands must be expressed in the same coordinate reference system;
//! nothing in this module reprojects or inspects CRS identifiers.
//!
//! ## Example
//!
//! ```rust
//! use extentcheck::bounds::{contains_with_margin, overlaps, BoundingBox, Margin};
//!
//! let region = BoundingBox::new(-9.55, 36.96, -6.19, 42.15);
//! let cutout = BoundingBox::new(-9.5, 37.0, -6.0, 42.0);
//!
//! assert!(overlaps(&region, &cutout));
//!
//! let result = contains_with_margin(&region, &cutout, Margin::new(0.25)?);
//! assert!(!result.contained);
//! assert_eq!(result.failing_edges().len(), 4);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Raised when a bounding box violates `min <= max` or carries a
/// non-finite coordinate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedBoundsError {
    #[error("malformed bounds: min_x ({min}) is greater than max_x ({max})")]
    InvertedX { min: f64, max: f64 },

    #[error("malformed bounds: min_y ({min}) is greater than max_y ({max})")]
    InvertedY { min: f64, max: f64 },

    #[error("malformed bounds: {field} is not finite ({value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("malformed bounds: no finite coordinates to derive an extent from")]
    NoCoordinates,
}

/// Raised when a margin is negative or not finite.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("margin must be a finite, non-negative number (got {0})")]
pub struct InvalidMarginError(pub f64);

/// Axis-aligned rectangle `[min_x, max_x] × [min_y, max_y]`.
///
/// `new` does not check the invariant, since extents coming from external
/// datasets may legitimately be empty or inverted and must be reported
/// rather than rejected at construction. Use [`BoundingBox::try_new`] or
/// [`validate_box`] at the boundary where data is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Builds a box from `(min_x, min_y, max_x, max_y)`, the same ordering
    /// geospatial libraries use for `total_bounds`.
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BoundingBox {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Builds a box and validates it.
    pub fn try_new(
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Result<Self, MalformedBoundsError> {
        let bbox = Self::new(min_x, min_y, max_x, max_y);
        validate_box(&bbox)?;
        Ok(bbox)
    }

    /// Computes the extent of a set of `(x, y)` points.
    ///
    /// Non-finite coordinates are skipped, so fill values decoded as NaN do
    /// not poison the extent. Fails with [`MalformedBoundsError::NoCoordinates`]
    /// when nothing finite remains.
    pub fn from_points<I>(points: I) -> Result<Self, MalformedBoundsError>
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut acc: Option<BoundingBox> = None;
        for (x, y) in points {
            if !x.is_finite() || !y.is_finite() {
                continue;
            }
            acc = Some(match acc {
                None => BoundingBox::new(x, y, x, y),
                Some(b) => BoundingBox::new(
                    b.min_x.min(x),
                    b.min_y.min(y),
                    b.max_x.max(x),
                    b.max_y.max(y),
                ),
            });
        }
        acc.ok_or(MalformedBoundsError::NoCoordinates)
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            self.min_x.min(other.min_x),
            self.min_y.min(other.min_y),
            self.max_x.max(other.max_x),
            self.max_y.max(other.max_y),
        )
    }

    /// Grows the box by `margin` on every side.
    pub fn inflate(&self, margin: Margin) -> BoundingBox {
        let m = margin.value();
        BoundingBox::new(self.min_x - m, self.min_y - m, self.max_x + m, self.max_y + m)
    }

    /// Inclusive point-in-box test.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn validate(&self) -> Result<(), MalformedBoundsError> {
        validate_box(self)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X=[{:.2}, {:.2}], Y=[{:.2}, {:.2}]",
            self.min_x, self.max_x, self.min_y, self.max_y
        )
    }
}

/// Required clearance a candidate must provide beyond a reference box.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Margin(f64);

impl Margin {
    pub const ZERO: Margin = Margin(0.0);

    pub fn new(value: f64) -> Result<Self, InvalidMarginError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Margin(value))
        } else {
            Err(InvalidMarginError(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Margin {
    type Error = InvalidMarginError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Margin::new(value)
    }
}

impl From<Margin> for f64 {
    fn from(margin: Margin) -> f64 {
        margin.0
    }
}

/// One side of a bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    West,
    East,
    South,
    North,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::West, Edge::East, Edge::South, Edge::North];

    pub fn as_str(&self) -> &'static str {
        match self {
            Edge::West => "west",
            Edge::East => "east",
            Edge::South => "south",
            Edge::North => "north",
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-axis outcome of an overlap test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisOverlap {
    pub x: bool,
    pub y: bool,
}

impl AxisOverlap {
    pub fn overlaps(&self) -> bool {
        self.x && self.y
    }
}

/// Outcome of [`contains_with_margin`].
///
/// A failing edge is a normal result, not an error: callers enumerate
/// [`ContainmentResult::failing_edges`] to report every shortfall at once.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainmentResult {
    pub west_ok: bool,
    pub east_ok: bool,
    pub south_ok: bool,
    pub north_ok: bool,
    pub contained: bool,
    /// Reference box inflated by the margin; the thresholds each edge is
    /// compared against.
    pub required: BoundingBox,
    /// Candidate box as tested.
    pub actual: BoundingBox,
    pub margin: Margin,
}

/// Single-edge view of a [`ContainmentResult`], for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EdgeCheck {
    pub edge: Edge,
    pub required: f64,
    pub actual: f64,
    pub ok: bool,
}

impl ContainmentResult {
    pub fn is_ok(&self, edge: Edge) -> bool {
        match edge {
            Edge::West => self.west_ok,
            Edge::East => self.east_ok,
            Edge::South => self.south_ok,
            Edge::North => self.north_ok,
        }
    }

    /// Insufficient edges in west, east, south, north order.
    pub fn failing_edges(&self) -> Vec<Edge> {
        Edge::ALL.into_iter().filter(|e| !self.is_ok(*e)).collect()
    }

    pub fn edge_checks(&self) -> Vec<EdgeCheck> {
        Edge::ALL
            .into_iter()
            .map(|edge| {
                let (required, actual) = match edge {
                    Edge::West => (self.required.min_x, self.actual.min_x),
                    Edge::East => (self.required.max_x, self.actual.max_x),
                    Edge::South => (self.required.min_y, self.actual.min_y),
                    Edge::North => (self.required.max_y, self.actual.max_y),
                };
                EdgeCheck {
                    edge,
                    required,
                    actual,
                    ok: self.is_ok(edge),
                }
            })
            .collect()
    }
}

/// Checks the `min <= max` and finiteness invariants of a box.
///
/// # Errors
///
/// Returns [`MalformedBoundsError`] for a non-finite coordinate (checked
/// first, in `min_x, min_y, max_x, max_y` order) or an inverted axis.
pub fn validate_box(bbox: &BoundingBox) -> Result<(), MalformedBoundsError> {
    let fields = [
        ("min_x", bbox.min_x),
        ("min_y", bbox.min_y),
        ("max_x", bbox.max_x),
        ("max_y", bbox.max_y),
    ];
    for (field, value) in fields {
        if !value.is_finite() {
            return Err(MalformedBoundsError::NonFinite { field, value });
        }
    }
    if bbox.min_x > bbox.max_x {
        return Err(MalformedBoundsError::InvertedX {
            min: bbox.min_x,
            max: bbox.max_x,
        });
    }
    if bbox.min_y > bbox.max_y {
        return Err(MalformedBoundsError::InvertedY {
            min: bbox.min_y,
            max: bbox.max_y,
        });
    }
    Ok(())
}

/// Per-axis interval intersection. Only strict separation counts as
/// disjoint, so boxes sharing an edge line overlap.
pub fn overlap_axes(reference: &BoundingBox, candidate: &BoundingBox) -> AxisOverlap {
    let x = !(reference.max_x < candidate.min_x || reference.min_x > candidate.max_x);
    let y = !(reference.max_y < candidate.min_y || reference.min_y > candidate.max_y);
    AxisOverlap { x, y }
}

/// Returns true iff the two boxes share at least one point.
pub fn overlaps(reference: &BoundingBox, candidate: &BoundingBox) -> bool {
    overlap_axes(reference, candidate).overlaps()
}

/// Checks whether `candidate` extends at least `margin` beyond `reference`
/// on all four sides.
///
/// # Examples
///
/// ```rust
/// use extentcheck::bounds::{contains_with_margin, BoundingBox, Edge, Margin};
///
/// let reference = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
/// let candidate = BoundingBox::new(-1.0, -1.0, 1.2, 2.0);
///
/// let result = contains_with_margin(&reference, &candidate, Margin::new(0.5)?);
/// assert_eq!(result.failing_edges(), vec![Edge::East]);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn contains_with_margin(
    reference: &BoundingBox,
    candidate: &BoundingBox,
    margin: Margin,
) -> ContainmentResult {
    let required = reference.inflate(margin);
    let west_ok = candidate.min_x <= required.min_x;
    let east_ok = candidate.max_x >= required.max_x;
    let south_ok = candidate.min_y <= required.min_y;
    let north_ok = candidate.max_y >= required.max_y;

    ContainmentResult {
        west_ok,
        east_ok,
        south_ok,
        north_ok,
        contained: west_ok && east_ok && south_ok && north_ok,
        required,
        actual: *candidate,
        margin,
    }
}
