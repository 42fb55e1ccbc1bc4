use crate::core::grid::Grid;
use crate::engine::config::{ExtractionConfig, ExtractionMode};
use crate::engine::error::EngineError;
use nalgebra::{Point3, distance};

/// Added to the peak distance before weighting, keeping the peak cell finite.
const DISTANCE_OFFSET: f64 = 0.1;
/// Cells more than this below the extraction cutoff are dropped from volume-mode regions.
const VOLUME_MARGIN: f64 = 5.0;

/// A fragment-sized region around one apolar peak.
#[derive(Debug, Clone)]
pub struct Location {
    /// Position of the peak among the detected maxima, highest first.
    pub identifier: usize,
    pub peak: Point3<f64>,
    pub peak_score: f64,
    /// Smoothed working region on the parent island's frame.
    pub region: Grid,
}

impl Location {
    /// Builds the region of the peak at `peak_idx` of `apolar` from the first parent island
    /// that encloses it.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NoParentRegion`] if no island of `parents` contains the peak
    /// within `config.parent_tolerance` cells.
    pub(crate) fn build(
        identifier: usize,
        apolar: &Grid,
        peak_idx: [usize; 3],
        parents: &[Grid],
        config: &ExtractionConfig,
    ) -> Result<Self, EngineError> {
        let peak = apolar.indices_to_point(peak_idx);
        let peak_score = apolar.value(peak_idx).unwrap_or(0.0);
        let parent = parents
            .iter()
            .find(|island| island.contains_point(&peak, config.parent_tolerance))
            .ok_or(EngineError::NoParentRegion {
                peak: [peak.x, peak.y, peak.z],
            })?;

        let region = match config.mode {
            ExtractionMode::Volume => {
                weight_by_distance(parent, &peak, config.cutoff - VOLUME_MARGIN)
                    .restricted_volume(config.volume)
                    .gaussian(config.volume_sigma)
            }
            ExtractionMode::Score => {
                let max_cells = config.max_score_volume / parent.cell_volume();
                let capped = if parent.count_above(config.score_mode_threshold) as f64 > max_cells {
                    parent.restricted_volume(config.max_score_volume)
                } else {
                    parent.clone()
                };
                capped.gaussian(config.score_sigma)
            }
        };

        Ok(Self {
            identifier,
            peak,
            peak_score,
            region,
        })
    }

    /// Whether `point` falls on a non-zero cell of the region.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        self.region.contains_point_above(point, 0, 0.0)
    }
}

/// Scales each cell at or above `floor` by `1 / (0.1 + distance to peak)`; other cells are
/// zeroed.
fn weight_by_distance(parent: &Grid, peak: &Point3<f64>, floor: f64) -> Grid {
    let mut weighted = parent.copy_and_clear();
    for ((i, j, k), &v) in parent.values().indexed_iter() {
        if v >= floor {
            let d = distance(&parent.indices_to_point([i, j, k]), peak);
            weighted.set_value([i, j, k], v / (DISTANCE_OFFSET + d));
        }
    }
    weighted
}
