use crate::core::grid::{Grid, GridError};
use crate::core::models::channel::Channel;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// Burial values below this are read as a clash with the protein.
const CLASH_BURIAL: f64 = 1.0;
/// Propensity values above this are favourable enough to override an apparent clash.
const FAVOURABLE_PROPENSITY: f64 = 2.0;
/// Padding, in cells, around the common frame of a propensity and a burial map.
const WEIGHTING_PADDING: usize = 1;

/// Raw output of one propensity job: the propensity map and the burial map computed with it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropensityMaps {
    pub propensity: Grid,
    pub ligsite: Grid,
}

/// Fills apparent clashes in a ligsite burial map where the propensity is favourable.
///
/// Cells with burial `< 1` and propensity `> 2` receive the neighbourhood mean of the
/// neighbourhood-max burial; every other cell receives the same smoothed correction of the
/// masked cells around it. Both maps are placed on a common frame first.
pub fn correct_ligsite(propensity: &Grid, ligsite: &Grid) -> Result<Grid, GridError> {
    let (propensity, ligsite) = Grid::common_grid(propensity, ligsite, 0)?;
    let mask = ligsite.zip_map(&propensity, |l, p| {
        if l < CLASH_BURIAL && p > FAVOURABLE_PROPENSITY {
            1.0
        } else {
            0.0
        }
    })?;
    let correction = mask
        .try_mul(&ligsite.max_value_of_neighbours())?
        .mean_value_of_neighbours();
    ligsite.try_add(&correction)
}

/// Multiplies a propensity map by a burial map on their common frame (one cell of padding).
pub fn weight(propensity: &Grid, buriedness: &Grid) -> Result<Grid, GridError> {
    let (propensity, buriedness) = Grid::common_grid(propensity, buriedness, WEIGHTING_PADDING)?;
    propensity.try_mul(&buriedness)
}

/// Weighted maps for every channel plus the burial map they were weighted with.
#[derive(Debug, Clone)]
pub struct WeightedMaps {
    pub grids: BTreeMap<Channel, Grid>,
    /// Burial map on the apolar channel's weighted frame.
    pub buriedness: Option<Grid>,
}

/// Weights every channel's propensity by its own corrected ligsite map, or by
/// `secondary_buriedness` for all channels when one is given.
#[instrument(skip_all, name = "buriedness_weighting")]
pub fn weight_all(
    maps: &BTreeMap<Channel, PropensityMaps>,
    secondary_buriedness: Option<&Grid>,
) -> Result<WeightedMaps, GridError> {
    let mut grids = BTreeMap::new();
    let mut kept_buriedness = None;
    for (&channel, job) in maps {
        let burial = match secondary_buriedness {
            Some(grid) => grid.clone(),
            None => correct_ligsite(&job.propensity, &job.ligsite)?,
        };
        let (propensity, burial) = Grid::common_grid(&job.propensity, &burial, WEIGHTING_PADDING)?;
        let weighted = propensity.try_mul(&burial)?;
        debug!(
            channel = %channel,
            max = weighted.max_value(),
            "Weighted propensity map."
        );
        if kept_buriedness.is_none() || channel == Channel::Apolar {
            kept_buriedness = Some(burial);
        }
        grids.insert(channel, weighted);
    }
    Ok(WeightedMaps {
        grids,
        buriedness: kept_buriedness,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use nalgebra::Point3;

    fn filled(origin: Point3<f64>, shape: [usize; 3], value: f64) -> Grid {
        let mut g = Grid::new(origin, GRID_SPACING, shape).unwrap();
        g.values_mut().fill(value);
        g
    }

    #[test]
    fn clash_under_favourable_propensity_is_filled() {
        let propensity = filled(Point3::origin(), [5, 5, 5], 3.0);
        let mut ligsite = filled(Point3::origin(), [5, 5, 5], 4.0);
        ligsite.set_value([2, 2, 2], 0.0);

        let corrected = correct_ligsite(&propensity, &ligsite).unwrap();
        // Only the centre is masked; its neighbourhood max is 4, spread as 4/27 over the block.
        let centre = corrected.value([2, 2, 2]).unwrap();
        assert!((centre - 4.0 / 27.0).abs() < 1e-12);
        let neighbour = corrected.value([1, 2, 2]).unwrap();
        assert!((neighbour - (4.0 + 4.0 / 27.0)).abs() < 1e-12);
        assert_eq!(corrected.value([0, 0, 0]), Some(4.0));
    }

    #[test]
    fn unfavourable_propensity_leaves_clashes_alone() {
        let propensity = filled(Point3::origin(), [3, 3, 3], 1.5);
        let mut ligsite = filled(Point3::origin(), [3, 3, 3], 4.0);
        ligsite.set_value([1, 1, 1], 0.0);
        let corrected = correct_ligsite(&propensity, &ligsite).unwrap();
        assert_eq!(corrected, ligsite);
    }

    #[test]
    fn weighting_multiplies_on_a_padded_common_frame() {
        let propensity = filled(Point3::origin(), [2, 2, 2], 3.0);
        let burial = filled(Point3::new(0.5, 0.0, 0.0), [2, 2, 2], 2.0);
        let weighted = weight(&propensity, &burial).unwrap();
        assert_eq!(weighted.shape(), [5, 4, 4]);
        assert_eq!(weighted.value_at_point(&Point3::new(0.5, 0.0, 0.0)), 6.0);
        assert_eq!(weighted.value_at_point(&Point3::new(0.0, 0.0, 0.0)), 0.0);
        assert_eq!(weighted.value_at_point(&Point3::new(1.0, 0.5, 0.5)), 0.0);
    }

    #[test]
    fn secondary_buriedness_replaces_ligsite_for_every_channel() {
        let job = PropensityMaps {
            propensity: filled(Point3::origin(), [3, 3, 3], 5.0),
            ligsite: filled(Point3::origin(), [3, 3, 3], 0.0),
        };
        let mut maps = BTreeMap::new();
        maps.insert(Channel::Apolar, job.clone());
        maps.insert(Channel::Donor, job);
        let secondary = filled(Point3::origin(), [3, 3, 3], 2.0);

        let weighted = weight_all(&maps, Some(&secondary)).unwrap();
        assert_eq!(weighted.grids.len(), 2);
        for grid in weighted.grids.values() {
            assert_eq!(grid.value_at_point(&Point3::new(0.5, 0.5, 0.5)), 10.0);
        }
        assert_eq!(weighted.buriedness.map(|b| b.max_value()), Some(2.0));
    }
}
