//! # Grid Module
//!
//! Regular cubic lattices of scalar values over 3D space, the common currency of every
//! hotspot computation.
//!
//! ## Overview
//!
//! A [`Grid`] is an axis-aligned lattice defined by an origin (the world coordinate of
//! cell `[0, 0, 0]`), a uniform spacing in Ångström and a dense `ndarray::Array3` of values.
//! Grids produced by the same pipeline live on one global lattice: the origin of every grid
//! is an integer multiple of the spacing, so a world point maps to the same lattice node no
//! matter which grid is asked. This is what makes [`Grid::super_grid`] and
//! [`Grid::common_grid`] exact re-framings rather than interpolations.
//!
//! ## Architecture
//!
//! - **Frame arithmetic** (this file) - point/index conversion, element-wise algebra, framing
//!   and reductions used by the scoring code.
//! - **Connected regions** ([`islands`]) - 26-connected components above a threshold.
//! - **Filters** ([`filters`]) - neighbourhood max/mean, gaussian smoothing, volume restriction
//!   and local maxima detection.

pub mod filters;
pub mod islands;

use nalgebra::{Point3, Vector3};
use ndarray::{Array3, Zip};
use thiserror::Error;

/// Lattice spacing used for every grid the pipeline creates, in Ångström.
pub const GRID_SPACING: f64 = 0.5;

const SPACING_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GridError {
    #[error("Grid shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch { left: [usize; 3], right: [usize; 3] },
    #[error("Grid origins are not on the same lattice node: {left:?} vs {right:?}")]
    OriginMismatch { left: [i64; 3], right: [i64; 3] },
    #[error("Grid spacings differ: {left} vs {right}")]
    SpacingMismatch { left: f64, right: f64 },
    #[error("Grid must have at least one point along every axis (got {0:?})")]
    EmptyShape([usize; 3]),
    #[error("Invalid grid spacing: {0}")]
    InvalidSpacing(f64),
    #[error("At least one grid is required")]
    NoGrids,
}

/// A regular 3D lattice of scalar values.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    origin: Point3<f64>,
    spacing: f64,
    values: Array3<f64>,
}

impl Grid {
    /// Creates a zero-filled grid.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::EmptyShape`] if any axis has no points and
    /// [`GridError::InvalidSpacing`] for a non-positive or non-finite spacing.
    pub fn new(origin: Point3<f64>, spacing: f64, shape: [usize; 3]) -> Result<Self, GridError> {
        Self::from_values(origin, spacing, Array3::zeros((shape[0], shape[1], shape[2])))
    }

    /// Wraps an existing value array.
    pub fn from_values(
        origin: Point3<f64>,
        spacing: f64,
        values: Array3<f64>,
    ) -> Result<Self, GridError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(GridError::InvalidSpacing(spacing));
        }
        let (nx, ny, nz) = values.dim();
        if nx == 0 || ny == 0 || nz == 0 {
            return Err(GridError::EmptyShape([nx, ny, nz]));
        }
        Ok(Self {
            origin,
            spacing,
            values,
        })
    }

    /// Creates a zero-filled grid covering the axis-aligned box of `points`, snapped to the
    /// global lattice and extended by `padding` cells on every side.
    pub fn enclosing<'a>(
        points: impl IntoIterator<Item = &'a Point3<f64>>,
        spacing: f64,
        padding: usize,
    ) -> Result<Self, GridError> {
        if !(spacing.is_finite() && spacing > 0.0) {
            return Err(GridError::InvalidSpacing(spacing));
        }
        let mut lo = [i64::MAX; 3];
        let mut hi = [i64::MIN; 3];
        for p in points {
            for axis in 0..3 {
                let node = (p[axis] / spacing).round() as i64;
                lo[axis] = lo[axis].min(node);
                hi[axis] = hi[axis].max(node);
            }
        }
        if lo[0] > hi[0] {
            return Err(GridError::EmptyShape([0, 0, 0]));
        }
        let pad = padding as i64;
        let lo = [lo[0] - pad, lo[1] - pad, lo[2] - pad];
        let shape = [
            (hi[0] + pad - lo[0] + 1) as usize,
            (hi[1] + pad - lo[1] + 1) as usize,
            (hi[2] + pad - lo[2] + 1) as usize,
        ];
        Self::on_lattice(lo, spacing, shape)
    }

    fn on_lattice(offset: [i64; 3], spacing: f64, shape: [usize; 3]) -> Result<Self, GridError> {
        let origin = Point3::new(
            offset[0] as f64 * spacing,
            offset[1] as f64 * spacing,
            offset[2] as f64 * spacing,
        );
        Self::new(origin, spacing, shape)
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.values.dim();
        [nx, ny, nz]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array3<f64> {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut Array3<f64> {
        &mut self.values
    }

    /// Volume of a single cell in Å³.
    pub fn cell_volume(&self) -> f64 {
        self.spacing.powi(3)
    }

    /// Lattice node of this grid's origin.
    pub fn lattice_offset(&self) -> [i64; 3] {
        [
            (self.origin.x / self.spacing).round() as i64,
            (self.origin.y / self.spacing).round() as i64,
            (self.origin.z / self.spacing).round() as i64,
        ]
    }

    /// Nearest-cell indices of a world point, possibly outside the grid.
    pub fn point_to_indices(&self, point: &Point3<f64>) -> [i64; 3] {
        let offset = self.lattice_offset();
        [
            (point.x / self.spacing).round() as i64 - offset[0],
            (point.y / self.spacing).round() as i64 - offset[1],
            (point.z / self.spacing).round() as i64 - offset[2],
        ]
    }

    /// Nearest-cell indices of a world point, or `None` when it falls outside the grid.
    pub fn indices_of(&self, point: &Point3<f64>) -> Option<[usize; 3]> {
        self.checked_indices(self.point_to_indices(point))
    }

    pub(crate) fn checked_indices(&self, idx: [i64; 3]) -> Option<[usize; 3]> {
        let shape = self.shape();
        let mut out = [0usize; 3];
        for axis in 0..3 {
            if idx[axis] < 0 || idx[axis] >= shape[axis] as i64 {
                return None;
            }
            out[axis] = idx[axis] as usize;
        }
        Some(out)
    }

    pub fn indices_to_point(&self, idx: [usize; 3]) -> Point3<f64> {
        self.origin
            + Vector3::new(idx[0] as f64, idx[1] as f64, idx[2] as f64) * self.spacing
    }

    pub fn value(&self, idx: [usize; 3]) -> Option<f64> {
        self.values.get(idx).copied()
    }

    /// Value of the cell nearest to `point`; zero outside the grid.
    pub fn value_at_point(&self, point: &Point3<f64>) -> f64 {
        self.indices_of(point)
            .and_then(|idx| self.value(idx))
            .unwrap_or(0.0)
    }

    pub fn set_value(&mut self, idx: [usize; 3], value: f64) -> bool {
        match self.values.get_mut(idx) {
            Some(cell) => {
                *cell = value;
                true
            }
            None => false,
        }
    }

    /// World coordinates of the first and last lattice nodes.
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let [nx, ny, nz] = self.shape();
        (self.origin, self.indices_to_point([nx - 1, ny - 1, nz - 1]))
    }

    /// A zero-filled grid on the same frame.
    pub fn copy_and_clear(&self) -> Grid {
        Grid {
            origin: self.origin,
            spacing: self.spacing,
            values: Array3::zeros(self.values.raw_dim()),
        }
    }

    pub fn same_frame(&self, other: &Grid) -> bool {
        self.ensure_same_frame(other).is_ok()
    }

    fn ensure_same_spacing(&self, other: &Grid) -> Result<(), GridError> {
        if (self.spacing - other.spacing).abs() > SPACING_TOLERANCE {
            return Err(GridError::SpacingMismatch {
                left: self.spacing,
                right: other.spacing,
            });
        }
        Ok(())
    }

    fn ensure_same_frame(&self, other: &Grid) -> Result<(), GridError> {
        self.ensure_same_spacing(other)?;
        if self.shape() != other.shape() {
            return Err(GridError::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        let (left, right) = (self.lattice_offset(), other.lattice_offset());
        if left != right {
            return Err(GridError::OriginMismatch { left, right });
        }
        Ok(())
    }

    /// Combines two grids on the same frame cell by cell.
    pub fn zip_map(&self, other: &Grid, f: impl Fn(f64, f64) -> f64) -> Result<Grid, GridError> {
        self.ensure_same_frame(other)?;
        let mut out = self.copy_and_clear();
        Zip::from(&mut out.values)
            .and(&self.values)
            .and(&other.values)
            .for_each(|o, &a, &b| *o = f(a, b));
        Ok(out)
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Grid {
        Grid {
            origin: self.origin,
            spacing: self.spacing,
            values: self.values.mapv(f),
        }
    }

    pub fn try_add(&self, other: &Grid) -> Result<Grid, GridError> {
        self.zip_map(other, |a, b| a + b)
    }

    pub fn try_sub(&self, other: &Grid) -> Result<Grid, GridError> {
        self.zip_map(other, |a, b| a - b)
    }

    pub fn try_mul(&self, other: &Grid) -> Result<Grid, GridError> {
        self.zip_map(other, |a, b| a * b)
    }

    /// 1.0 where `self > other`, else 0.0.
    pub fn gt_mask(&self, other: &Grid) -> Result<Grid, GridError> {
        self.zip_map(other, |a, b| if a > b { 1.0 } else { 0.0 })
    }

    /// 1.0 where the value exceeds `threshold`, else 0.0.
    pub fn threshold_mask(&self, threshold: f64) -> Grid {
        self.map(|v| if v > threshold { 1.0 } else { 0.0 })
    }

    fn paste_max(&mut self, src: &Grid) {
        let dst_offset = self.lattice_offset();
        let src_offset = src.lattice_offset();
        let delta = [
            src_offset[0] - dst_offset[0],
            src_offset[1] - dst_offset[1],
            src_offset[2] - dst_offset[2],
        ];
        for ((i, j, k), &v) in src.values.indexed_iter() {
            let target = [i as i64 + delta[0], j as i64 + delta[1], k as i64 + delta[2]];
            if let Some(idx) = self.checked_indices(target) {
                let cell = &mut self.values[idx];
                *cell = cell.max(v);
            }
        }
    }

    /// A single grid spanning the union of the inputs' frames plus `padding` cells per side.
    ///
    /// Every input value is copied to its lattice node; where inputs overlap the larger value
    /// wins. Nodes covered by no input are zero.
    ///
    /// # Errors
    ///
    /// Returns [`GridError::NoGrids`] for an empty slice and
    /// [`GridError::SpacingMismatch`] if the inputs do not share a spacing.
    pub fn super_grid(padding: usize, grids: &[&Grid]) -> Result<Grid, GridError> {
        let first = grids.first().ok_or(GridError::NoGrids)?;
        let mut lo = [i64::MAX; 3];
        let mut hi = [i64::MIN; 3];
        for grid in grids {
            first.ensure_same_spacing(grid)?;
            let offset = grid.lattice_offset();
            let shape = grid.shape();
            for axis in 0..3 {
                lo[axis] = lo[axis].min(offset[axis]);
                hi[axis] = hi[axis].max(offset[axis] + shape[axis] as i64 - 1);
            }
        }
        let pad = padding as i64;
        let lo = [lo[0] - pad, lo[1] - pad, lo[2] - pad];
        let shape = [
            (hi[0] + pad - lo[0] + 1) as usize,
            (hi[1] + pad - lo[1] + 1) as usize,
            (hi[2] + pad - lo[2] + 1) as usize,
        ];
        let mut out = Grid::on_lattice(lo, first.spacing, shape)?;
        out.values.fill(f64::NEG_INFINITY);
        for grid in grids {
            out.paste_max(grid);
        }
        out.values.mapv_inplace(|v| if v == f64::NEG_INFINITY { 0.0 } else { v });
        Ok(out)
    }

    /// Re-frames two grids onto their shared super-frame so they can be combined cell by cell.
    pub fn common_grid(a: &Grid, b: &Grid, padding: usize) -> Result<(Grid, Grid), GridError> {
        let frame = Grid::super_grid(padding, &[a, b])?.copy_and_clear();
        Ok((a.aligned_to(&frame)?, b.aligned_to(&frame)?))
    }

    /// Copies this grid's values into `template`'s frame, zero where this grid has no data.
    pub fn aligned_to(&self, template: &Grid) -> Result<Grid, GridError> {
        self.ensure_same_spacing(template)?;
        if self.same_frame(template) {
            return Ok(self.clone());
        }
        let mut out = template.copy_and_clear();
        out.values.fill(f64::NEG_INFINITY);
        out.paste_max(self);
        out.values.mapv_inplace(|v| if v == f64::NEG_INFINITY { 0.0 } else { v });
        Ok(out)
    }

    /// Whether `point` lies within the grid's box expanded by `tolerance` cells on every side.
    pub fn contains_point(&self, point: &Point3<f64>, tolerance: usize) -> bool {
        let idx = self.point_to_indices(point);
        let shape = self.shape();
        let tol = tolerance as i64;
        (0..3).all(|axis| idx[axis] >= -tol && idx[axis] < shape[axis] as i64 + tol)
    }

    /// [`Grid::contains_point`] that additionally requires the value at `point` to exceed
    /// `threshold`.
    pub fn contains_point_above(&self, point: &Point3<f64>, tolerance: usize, threshold: f64) -> bool {
        self.value_at_point(point) > threshold && self.contains_point(point, tolerance)
    }

    /// Value-weighted centroid of the positive cells.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        let mut weighted = Vector3::zeros();
        let mut total = 0.0;
        for ((i, j, k), &v) in self.values.indexed_iter() {
            if v > 0.0 {
                weighted += self.indices_to_point([i, j, k]).coords * v;
                total += v;
            }
        }
        (total > 0.0).then(|| Point3::from(weighted / total))
    }

    /// `(min, max)` over all cells.
    pub fn extrema(&self) -> (f64, f64) {
        self.values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            })
    }

    pub fn max_value(&self) -> f64 {
        self.extrema().1
    }

    pub fn indices_at_value(&self, value: f64) -> Vec<[usize; 3]> {
        self.values
            .indexed_iter()
            .filter(|(_, v)| **v == value)
            .map(|((i, j, k), _)| [i, j, k])
            .collect()
    }

    pub fn count_above(&self, threshold: f64) -> usize {
        self.values.iter().filter(|&&v| v > threshold).count()
    }

    pub fn values_above(&self, threshold: f64) -> Vec<f64> {
        self.values.iter().copied().filter(|&v| v > threshold).collect()
    }

    pub fn total(&self) -> f64 {
        self.values.sum()
    }

    /// Percentile (0–100, linear interpolation) of the values above `threshold`; zero if none.
    pub fn percentile_score(&self, percentile: f64, threshold: f64) -> f64 {
        let mut above = self.values_above(threshold);
        if above.is_empty() {
            return 0.0;
        }
        above.sort_by(f64::total_cmp);
        let rank = (percentile.clamp(0.0, 100.0) / 100.0) * (above.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let frac = rank - lower as f64;
        above[lower] + (above[upper] - above[lower]) * frac
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid_with(origin: [f64; 3], shape: [usize; 3], cells: &[([usize; 3], f64)]) -> Grid {
        let mut g = Grid::new(Point3::from(origin), GRID_SPACING, shape).unwrap();
        for (idx, v) in cells {
            g.set_value(*idx, *v);
        }
        g
    }

    #[test]
    fn point_index_conversion_round_trips_on_lattice_nodes() {
        let g = grid_with([1.0, -2.5, 0.0], [10, 10, 10], &[]);
        let p = g.indices_to_point([3, 4, 5]);
        assert_eq!(p, Point3::new(2.5, -0.5, 2.5));
        assert_eq!(g.indices_of(&p), Some([3, 4, 5]));
        assert_eq!(g.indices_of(&Point3::new(2.6, -0.4, 2.4)), Some([3, 4, 5]));
    }

    #[test]
    fn points_outside_the_grid_have_no_indices_and_read_as_zero() {
        let g = grid_with([0.0, 0.0, 0.0], [4, 4, 4], &[([0, 0, 0], 3.0)]);
        assert_eq!(g.indices_of(&Point3::new(-0.5, 0.0, 0.0)), None);
        assert_eq!(g.indices_of(&Point3::new(2.0, 0.0, 0.0)), None);
        assert_eq!(g.value_at_point(&Point3::new(10.0, 0.0, 0.0)), 0.0);
        assert_eq!(g.value_at_point(&Point3::new(0.0, 0.0, 0.0)), 3.0);
    }

    #[test]
    fn enclosing_grid_snaps_to_lattice_and_pads() {
        let points = [Point3::new(0.1, 0.0, 0.0), Point3::new(2.0, 1.0, 0.4)];
        let g = Grid::enclosing(&points, GRID_SPACING, 1).unwrap();
        assert_eq!(g.origin(), Point3::new(-0.5, -0.5, -0.5));
        assert_eq!(g.shape(), [7, 5, 4]);
    }

    #[test]
    fn element_wise_algebra_requires_a_shared_frame() {
        let a = grid_with([0.0; 3], [2, 2, 2], &[([0, 0, 0], 2.0)]);
        let b = grid_with([0.0; 3], [2, 2, 2], &[([0, 0, 0], 3.0), ([1, 1, 1], 1.0)]);
        assert_eq!(a.try_mul(&b).unwrap().value([0, 0, 0]), Some(6.0));
        assert_eq!(a.try_sub(&b).unwrap().value([1, 1, 1]), Some(-1.0));
        assert_eq!(b.gt_mask(&a).unwrap().value([1, 1, 1]), Some(1.0));

        let shifted = grid_with([0.5, 0.0, 0.0], [2, 2, 2], &[]);
        assert!(matches!(
            a.try_add(&shifted),
            Err(GridError::OriginMismatch { .. })
        ));
    }

    #[test]
    fn super_grid_spans_union_and_keeps_maximum_on_overlap() {
        let a = grid_with([0.0; 3], [3, 3, 3], &[([2, 2, 2], 5.0)]);
        let b = grid_with([1.0, 1.0, 1.0], [3, 3, 3], &[([0, 0, 0], 7.0), ([2, 2, 2], 1.0)]);
        let sg = Grid::super_grid(0, &[&a, &b]).unwrap();
        assert_eq!(sg.origin(), Point3::origin());
        assert_eq!(sg.shape(), [5, 5, 5]);
        assert_eq!(sg.value_at_point(&Point3::new(1.0, 1.0, 1.0)), 7.0);
        assert_eq!(sg.value_at_point(&Point3::new(2.0, 2.0, 2.0)), 1.0);

        let padded = Grid::super_grid(2, &[&a]).unwrap();
        assert_eq!(padded.shape(), [7, 7, 7]);
        assert_eq!(padded.value_at_point(&Point3::new(1.0, 1.0, 1.0)), 5.0);
    }

    #[test]
    fn common_grid_of_grids_on_the_same_frame_is_identity() {
        let a = grid_with([0.0; 3], [4, 3, 2], &[([1, 1, 1], 2.0)]);
        let b = grid_with([0.0; 3], [4, 3, 2], &[([3, 2, 1], -4.0)]);
        let (ca, cb) = Grid::common_grid(&a, &b, 0).unwrap();
        assert_eq!(ca, a);
        assert_eq!(cb, b);
    }

    #[test]
    fn aligned_grid_preserves_negative_values() {
        let a = grid_with([0.0; 3], [2, 2, 2], &[([1, 1, 1], -3.0)]);
        let template = grid_with([-1.0, -1.0, -1.0], [6, 6, 6], &[]);
        let aligned = a.aligned_to(&template).unwrap();
        assert_eq!(aligned.value_at_point(&Point3::new(0.5, 0.5, 0.5)), -3.0);
        assert_eq!(aligned.value_at_point(&Point3::new(-1.0, -1.0, -1.0)), 0.0);
    }

    #[test]
    fn contains_point_honours_tolerance_in_cells() {
        let g = grid_with([0.0; 3], [2, 2, 2], &[([1, 1, 1], 4.0)]);
        assert!(!g.contains_point(&Point3::new(-1.0, 0.0, 0.0), 0));
        assert!(g.contains_point(&Point3::new(-1.0, 0.0, 0.0), 2));
        assert!(g.contains_point_above(&Point3::new(0.5, 0.5, 0.5), 0, 3.0));
        assert!(!g.contains_point_above(&Point3::new(0.0, 0.0, 0.0), 0, 3.0));
    }

    #[test]
    fn reductions_report_expected_statistics() {
        let g = grid_with(
            [0.0; 3],
            [3, 1, 1],
            &[([0, 0, 0], 1.0), ([1, 0, 0], 2.0), ([2, 0, 0], 3.0)],
        );
        assert_eq!(g.count_above(1.5), 2);
        assert_eq!(g.total(), 6.0);
        assert_eq!(g.extrema(), (1.0, 3.0));
        assert_eq!(g.indices_at_value(3.0), vec![[2, 0, 0]]);
        assert!((g.percentile_score(75.0, 0.0) - 2.5).abs() < 1e-12);
        assert_eq!(g.percentile_score(75.0, 10.0), 0.0);
        let c = g.centroid().unwrap();
        assert!((c.x - (0.0 * 1.0 + 0.5 * 2.0 + 1.0 * 3.0) / 6.0).abs() < 1e-12);
    }
}
