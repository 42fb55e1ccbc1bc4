use super::Grid;
use ndarray::Array3;
use std::collections::VecDeque;

/// A 26-connected set of cells above a threshold.
#[derive(Debug, Clone)]
pub(crate) struct Component {
    pub cells: Vec<[usize; 3]>,
    pub total: f64,
}

impl Component {
    pub fn len(&self) -> usize {
        self.cells.len()
    }
}

const NEIGHBOUR_OFFSETS: [[i64; 3]; 26] = {
    let mut out = [[0i64; 3]; 26];
    let mut n = 0;
    let mut dx = -1;
    while dx <= 1 {
        let mut dy = -1;
        while dy <= 1 {
            let mut dz = -1;
            while dz <= 1 {
                if !(dx == 0 && dy == 0 && dz == 0) {
                    out[n] = [dx, dy, dz];
                    n += 1;
                }
                dz += 1;
            }
            dy += 1;
        }
        dx += 1;
    }
    out
};

/// Labels the connected components of cells strictly above `threshold`, in scan order of
/// their first cell.
pub(crate) fn label_components(grid: &Grid, threshold: f64) -> Vec<Component> {
    let values = grid.values();
    let mut visited = Array3::from_elem(values.raw_dim(), false);
    let mut components = Vec::new();
    let mut queue = VecDeque::new();

    for ((i, j, k), &v) in values.indexed_iter() {
        if v <= threshold || visited[[i, j, k]] {
            continue;
        }
        visited[[i, j, k]] = true;
        queue.push_back([i, j, k]);
        let mut cells = Vec::new();
        let mut total = 0.0;

        while let Some(cell) = queue.pop_front() {
            cells.push(cell);
            total += values[cell];
            for offset in NEIGHBOUR_OFFSETS {
                let candidate = [
                    cell[0] as i64 + offset[0],
                    cell[1] as i64 + offset[1],
                    cell[2] as i64 + offset[2],
                ];
                let Some(next) = grid.checked_indices(candidate) else {
                    continue;
                };
                if !visited[next] && values[next] > threshold {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        components.push(Component { cells, total });
    }
    components
}

impl Grid {
    /// Connected regions of cells whose value exceeds `threshold`.
    ///
    /// Each island is returned as its own grid covering the index bounding box of its members,
    /// on the same lattice as `self`, with non-member cells set to zero. Islands are ordered by
    /// the scan position of their first cell.
    pub fn islands(&self, threshold: f64) -> Vec<Grid> {
        label_components(self, threshold)
            .iter()
            .filter_map(|c| self.sub_grid_of(&c.cells))
            .collect()
    }

    /// The island with the greatest summed value above `threshold`.
    pub fn best_island(&self, threshold: f64) -> Option<Grid> {
        let components = label_components(self, threshold);
        let best = best_component(&components)?;
        self.sub_grid_of(&best.cells)
    }

    pub(crate) fn sub_grid_of(&self, cells: &[[usize; 3]]) -> Option<Grid> {
        let first = cells.first()?;
        let mut lo = *first;
        let mut hi = *first;
        for cell in cells {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(cell[axis]);
                hi[axis] = hi[axis].max(cell[axis]);
            }
        }
        let shape = [hi[0] - lo[0] + 1, hi[1] - lo[1] + 1, hi[2] - lo[2] + 1];
        let mut island = Grid::new(self.indices_to_point(lo), self.spacing(), shape).ok()?;
        for cell in cells {
            let local = [cell[0] - lo[0], cell[1] - lo[1], cell[2] - lo[2]];
            island.set_value(local, self.values()[*cell]);
        }
        Some(island)
    }
}

/// Highest total wins; the earliest component wins ties.
pub(crate) fn best_component(components: &[Component]) -> Option<&Component> {
    components.iter().fold(None, |best: Option<&Component>, c| match best {
        Some(b) if b.total >= c.total => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use nalgebra::Point3;

    fn two_blob_grid() -> Grid {
        let mut g = Grid::new(Point3::origin(), GRID_SPACING, [10, 4, 4]).unwrap();
        for i in 0..3 {
            g.set_value([i, 1, 1], 5.0);
        }
        g.set_value([6, 2, 2], 9.0);
        g.set_value([7, 3, 3], 8.0);
        g
    }

    #[test]
    fn diagonal_neighbours_belong_to_the_same_island() {
        let islands = two_blob_grid().islands(1.0);
        assert_eq!(islands.len(), 2);
        assert_eq!(islands[1].count_above(0.0), 2);
        assert_eq!(islands[1].shape(), [2, 2, 2]);
        assert_eq!(islands[1].value_at_point(&Point3::new(3.0, 1.0, 1.0)), 9.0);
    }

    #[test]
    fn islands_are_ordered_by_first_cell_in_scan_order() {
        let islands = two_blob_grid().islands(1.0);
        assert_eq!(islands[0].origin(), Point3::new(0.0, 0.5, 0.5));
        assert_eq!(islands[0].shape(), [3, 1, 1]);
    }

    #[test]
    fn threshold_is_strict() {
        let g = two_blob_grid();
        assert_eq!(g.islands(5.0).len(), 1);
        assert!(g.islands(9.0).is_empty());
    }

    #[test]
    fn best_island_maximises_total_value() {
        let best = two_blob_grid().best_island(1.0).unwrap();
        assert_eq!(best.total(), 17.0);
    }

    #[test]
    fn raising_the_threshold_never_adds_cells() {
        let g = two_blob_grid();
        let mut previous = usize::MAX;
        for t in [0.0, 4.0, 6.0, 8.5, 10.0] {
            let count: usize = g.islands(t).iter().map(|i| i.count_above(0.0)).sum();
            assert!(count <= previous);
            previous = count;
        }
    }
}
