use super::config::SelectionConfig;
use super::error::EngineError;
use super::result::HotspotResult;
use super::utils::minimize::minimize_bounded;
use crate::core::grid::islands::{best_component, label_components};
use crate::core::grid::{Grid, GridError};
use crate::core::models::channel::Channel;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Objective value for a cutoff at which no island survives.
const NO_ISLAND_PENALTY: f64 = 9999.0;

/// Outcome of a best-continuous-volume selection.
#[derive(Debug, Clone)]
pub struct VolumeSelection {
    /// The original maps restricted to the selected region.
    pub selected: HotspotResult,
    /// The original maps with the selected region removed.
    pub remaining: HotspotResult,
    /// Value of the lowest selected cell in the summed single-owner map.
    pub cutoff: f64,
    /// Number of selected cells.
    pub cells: usize,
}

/// Places every grid on the union of their frames.
fn on_common_frame(grids: &BTreeMap<Channel, Grid>) -> Result<BTreeMap<Channel, Grid>, GridError> {
    let all: Vec<&Grid> = grids.values().collect();
    let frame = Grid::super_grid(0, &all)?.copy_and_clear();
    grids
        .iter()
        .map(|(&channel, grid)| Ok((channel, grid.aligned_to(&frame)?)))
        .collect()
}

/// Winner-take-all maps: a cell keeps its value in the channel whose value strictly exceeds
/// every other channel's there and is zero elsewhere. Every channel competes; tied cells are
/// zero in all of them.
pub fn single_owner_maps(
    grids: &BTreeMap<Channel, Grid>,
) -> Result<BTreeMap<Channel, Grid>, GridError> {
    let aligned = on_common_frame(grids)?;
    let mut owners = BTreeMap::new();
    for (&channel, grid) in &aligned {
        let mut owned = grid.clone();
        for (&other_channel, other) in &aligned {
            if other_channel == channel {
                continue;
            }
            owned = owned.try_mul(&grid.gt_mask(other)?)?;
        }
        owners.insert(channel, owned);
    }
    Ok(owners)
}

/// Number of cells of the highest-total island strictly above `cutoff`.
fn best_island_size(grid: &Grid, cutoff: f64) -> Option<usize> {
    let components = label_components(grid, cutoff);
    best_component(&components).map(|c| c.len())
}

/// Searches a cutoff whose best island holds `target` cells.
fn solve_cutoff(sum: &Grid, target: usize, config: &SelectionConfig) -> f64 {
    let objective = |cutoff: f64| match best_island_size(sum, cutoff) {
        Some(size) => (target as f64 - size as f64).abs(),
        None => NO_ISLAND_PENALTY,
    };
    let minimum = minimize_bounded(
        objective,
        0.0,
        config.upper_cutoff,
        config.xtol,
        config.max_evaluations,
    );
    debug!(
        cutoff = minimum.x,
        objective = minimum.value,
        evaluations = minimum.evaluations,
        converged = minimum.converged,
        "Cutoff search finished."
    );

    let mut cutoff = minimum.x;
    if best_island_size(sum, cutoff).is_some_and(|size| size > target) {
        cutoff -= config.xtol;
    }
    if cutoff >= config.saturation_cutoff {
        cutoff = config.fallback_cutoff;
    }
    cutoff
}

/// 1.0 on the `target` highest cells of the best island above `cutoff`, on `sum`'s frame.
/// Equal values are taken in scan order, so a plateau never shrinks the selection.
///
/// Returns the mask and the value of the lowest kept cell, or `None` when no island exists.
fn top_cells_mask(sum: &Grid, cutoff: f64, target: usize) -> Option<(Grid, f64)> {
    let components = label_components(sum, cutoff);
    let island = best_component(&components)?;

    let mut ranked: Vec<([usize; 3], f64)> =
        island.cells.iter().map(|&c| (c, sum.values()[c])).collect();
    ranked.sort_by(|a, b| a.0.cmp(&b.0));
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    let keep = target.clamp(1, ranked.len());

    let mut mask = sum.copy_and_clear();
    for &(cell, _) in &ranked[..keep] {
        mask.set_value(cell, 1.0);
    }
    Some((mask, ranked[keep - 1].1))
}

/// Selects the connected region of `config.volume` with the greatest aggregate score.
///
/// The single-owner maps of every channel are summed, cells flagged in `exclusion_mask`
/// (value ≥ 1) are zeroed, and a cutoff is searched whose best island matches the target cell
/// count. The resulting mask is applied to the original channel maps. When no island can be
/// found the selection is empty and `remaining` equals the input.
#[instrument(skip_all, name = "best_continuous_volume", fields(volume = config.volume))]
pub fn select_best_continuous_volume(
    result: &HotspotResult,
    config: &SelectionConfig,
    exclusion_mask: Option<&Grid>,
) -> Result<VolumeSelection, EngineError> {
    let originals = on_common_frame(&result.super_grids)?;
    let owners = single_owner_maps(&originals)?;

    let mut owned = owners.values();
    let first = owned.next().ok_or(GridError::NoGrids)?;
    let mut sum = owned.try_fold(first.clone(), |acc, g| acc.try_add(g))?;

    if let Some(exclusion) = exclusion_mask {
        let (aligned_sum, aligned_mask) = Grid::common_grid(&sum, exclusion, 0)?;
        sum = aligned_sum.zip_map(&aligned_mask, |v, m| if m < 1.0 { v } else { 0.0 })?;
    }

    let target = (config.volume / sum.cell_volume()).floor() as usize;
    let cutoff = solve_cutoff(&sum, target, config);

    let frame = first.copy_and_clear();
    let (mask, final_cutoff) = match top_cells_mask(&sum, cutoff, target) {
        Some((mask, final_cutoff)) => (mask.aligned_to(&frame)?, final_cutoff),
        None => {
            warn!(
                "{}",
                EngineError::EmptySelection {
                    volume: config.volume
                }
            );
            (frame, cutoff)
        }
    };
    let cells = mask.count_above(0.0);

    let mut selected = BTreeMap::new();
    let mut remaining = BTreeMap::new();
    for (channel, grid) in originals {
        let kept = grid.try_mul(&mask)?;
        remaining.insert(channel, grid.try_sub(&kept)?);
        selected.insert(channel, kept);
    }

    info!(
        cutoff = final_cutoff,
        cells,
        volume = cells as f64 * mask.cell_volume(),
        "Selected best continuous volume."
    );

    let mut selected = HotspotResult::new(selected);
    let mut remaining = HotspotResult::new(remaining);
    selected.protein = result.protein.clone();
    remaining.protein = result.protein.clone();
    Ok(VolumeSelection {
        selected,
        remaining,
        cutoff: final_cutoff,
        cells,
    })
}
