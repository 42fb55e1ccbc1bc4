use super::Grid;
use itertools::iproduct;
use ndarray::{Array3, Axis, Zip};
use std::cmp::Ordering;

/// Multiple of sigma at which the gaussian kernel is truncated.
const GAUSSIAN_TRUNCATE: f64 = 4.0;

impl Grid {
    /// Maximum over the 26 neighbours of each cell (the cell itself excluded), clipped at the
    /// border.
    pub fn max_value_of_neighbours(&self) -> Grid {
        let values = self.values();
        let mut out = self.copy_and_clear();
        for ((i, j, k), o) in out.values_mut().indexed_iter_mut() {
            *o = self
                .neighbourhood(i, j, k)
                .filter(|&idx| idx != [i, j, k])
                .map(|idx| values[idx])
                .fold(f64::NEG_INFINITY, f64::max);
            if *o == f64::NEG_INFINITY {
                *o = 0.0;
            }
        }
        out
    }

    /// Mean over the 3×3×3 block centred on each cell (the cell itself included), clipped at
    /// the border.
    pub fn mean_value_of_neighbours(&self) -> Grid {
        let values = self.values();
        let mut out = self.copy_and_clear();
        for ((i, j, k), o) in out.values_mut().indexed_iter_mut() {
            let (sum, n) = self
                .neighbourhood(i, j, k)
                .fold((0.0, 0usize), |(s, n), idx| (s + values[idx], n + 1));
            *o = sum / n as f64;
        }
        out
    }

    fn neighbourhood(&self, i: usize, j: usize, k: usize) -> impl Iterator<Item = [usize; 3]> {
        let [nx, ny, nz] = self.shape();
        let span = |c: usize, n: usize| c.saturating_sub(1)..=(c + 1).min(n - 1);
        iproduct!(span(i, nx), span(j, ny), span(k, nz)).map(|(a, b, c)| [a, b, c])
    }

    /// Separable gaussian smoothing with `sigma` measured in cells and mirrored borders.
    pub fn gaussian(&self, sigma: f64) -> Grid {
        if sigma <= 0.0 {
            return self.clone();
        }
        let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as usize;
        let mut kernel: Vec<f64> = (0..=2 * radius)
            .map(|n| {
                let x = n as f64 - radius as f64;
                (-0.5 * x * x / (sigma * sigma)).exp()
            })
            .collect();
        let norm: f64 = kernel.iter().sum();
        kernel.iter_mut().for_each(|w| *w /= norm);

        let mut values = self.values().clone();
        for axis in 0..3 {
            values = filter_axis(&values, axis, |lane, out| {
                let n = lane.len() as i64;
                for (pos, o) in out.iter_mut().enumerate() {
                    *o = kernel
                        .iter()
                        .enumerate()
                        .map(|(m, w)| {
                            let src = reflect(pos as i64 + m as i64 - radius as i64, n);
                            w * lane[src]
                        })
                        .sum();
                }
            });
        }
        let mut out = self.copy_and_clear();
        *out.values_mut() = values;
        out
    }

    /// Keeps the `⌊volume / cell volume⌋` highest-valued cells and zeroes the rest. Ties are
    /// resolved in scan order.
    pub fn restricted_volume(&self, volume: f64) -> Grid {
        let keep = (volume / self.cell_volume()).floor().max(0.0) as usize;
        if keep >= self.len() {
            return self.clone();
        }
        let mut ranked: Vec<(usize, f64)> = self.values().iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut flags = vec![false; self.len()];
        for &(flat, _) in ranked.iter().take(keep) {
            flags[flat] = true;
        }
        let mut out = self.clone();
        out.values_mut()
            .iter_mut()
            .zip(flags)
            .filter(|(_, kept)| !kept)
            .for_each(|(v, _)| *v = 0.0);
        out
    }

    /// Peaks of the grid, highest first.
    ///
    /// A cell is a peak if it equals the maximum of the cube of half-width `min_distance`
    /// around it, exceeds `threshold`, and lies at least `min_distance` cells away from every
    /// face of the grid. Peaks closer than `min_distance` (Chebyshev) to a higher accepted
    /// peak are suppressed, which also collapses plateaus to a single peak.
    pub fn local_maxima(&self, min_distance: usize, threshold: f64) -> Vec<[usize; 3]> {
        let shape = self.shape();
        let r = min_distance;
        if (0..3).any(|axis| shape[axis] <= 2 * r) {
            return Vec::new();
        }
        let mut maxed = self.values().clone();
        for axis in 0..3 {
            maxed = filter_axis(&maxed, axis, |lane, out| {
                let n = lane.len();
                for (pos, o) in out.iter_mut().enumerate() {
                    let lo = pos.saturating_sub(r);
                    let hi = (pos + r).min(n - 1);
                    *o = lane[lo..=hi].iter().copied().fold(f64::NEG_INFINITY, f64::max);
                }
            });
        }

        let mut candidates: Vec<([usize; 3], f64)> = self
            .values()
            .indexed_iter()
            .filter(|((i, j, k), v)| {
                let idx = [*i, *j, *k];
                **v > threshold
                    && **v >= maxed[idx]
                    && (0..3).all(|a| idx[a] >= r && idx[a] < shape[a] - r)
            })
            .map(|((i, j, k), v)| ([i, j, k], *v))
            .collect();
        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        let mut peaks: Vec<[usize; 3]> = Vec::new();
        for (idx, _) in candidates {
            let suppressed = peaks.iter().any(|p| {
                (0..3)
                    .map(|a| p[a].abs_diff(idx[a]))
                    .max()
                    .is_some_and(|d| d <= r)
            });
            if !suppressed {
                peaks.push(idx);
            }
        }
        peaks
    }
}

/// Applies a 1D filter to every lane of `values` along `axis`.
fn filter_axis(
    values: &Array3<f64>,
    axis: usize,
    filter: impl Fn(&[f64], &mut [f64]),
) -> Array3<f64> {
    let mut out = Array3::zeros(values.raw_dim());
    let mut input = Vec::new();
    let mut output = Vec::new();
    Zip::from(out.lanes_mut(Axis(axis)))
        .and(values.lanes(Axis(axis)))
        .for_each(|mut o, i| {
            input.clear();
            input.extend(i.iter().copied());
            output.clear();
            output.resize(input.len(), 0.0);
            filter(&input, &mut output);
            o.iter_mut().zip(&output).for_each(|(dst, src)| *dst = *src);
        });
    out
}

/// Mirror index into `0..n` where the border sample is repeated (`d c b a | a b c d`).
fn reflect(mut idx: i64, n: i64) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * n;
    idx = idx.rem_euclid(period);
    if idx >= n {
        idx = period - idx - 1;
    }
    idx as usize
}
