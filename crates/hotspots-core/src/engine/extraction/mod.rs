//! # Hotspot Extraction Module
//!
//! Splits whole-protein hotspot maps into fragment-sized hotspots.
//!
//! ## Overview
//!
//! Extraction is anchored on apolar peaks. Each peak above the cutoff becomes a [`Location`]
//! whose working region is carved from the apolar island enclosing it. Islands of the polar
//! and charged maps become [`Feature`]s, which are assigned to the nearby location whose
//! region holds most of their probe occupants. Every surviving location is returned as an
//! [`ExtractedHotspot`] carrying its own composite [`HotspotResult`].
//!
//! Extraction is best-effort: peaks without a parent island and features with no location in
//! range are logged and skipped.

mod feature;
mod location;

pub use feature::Feature;
pub use location::Location;

use super::config::ExtractionConfig;
use super::error::EngineError;
use super::result::HotspotResult;
use super::sampler::SampledProbe;
use super::utils::partners::PartnerIndex;
use crate::core::grid::Grid;
use crate::core::models::channel::Channel;
use nalgebra::{Point3, distance};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Padding, in cells, of a composite channel built from feature islands.
const COMPOSITE_PADDING: usize = 1;

/// One fragment-sized hotspot.
#[derive(Debug, Clone)]
pub struct ExtractedHotspot {
    pub identifier: usize,
    pub peak: Point3<f64>,
    pub peak_score: f64,
    /// Composite maps: the location region as apolar map, assigned feature islands otherwise.
    pub result: HotspotResult,
    pub features: Vec<Feature>,
}

pub struct HotspotExtractor<'a> {
    result: &'a HotspotResult,
    config: &'a ExtractionConfig,
}

impl<'a> HotspotExtractor<'a> {
    pub fn new(result: &'a HotspotResult, config: &'a ExtractionConfig) -> Self {
        Self { result, config }
    }

    /// Locations around every apolar peak above the cutoff that has a parent island.
    pub fn locations(&self) -> Result<Vec<Location>, EngineError> {
        let apolar = self.result.grid(Channel::Apolar)?;
        let peaks = apolar.local_maxima(self.config.min_peak_distance, self.config.cutoff);
        debug!(peaks = peaks.len(), "Apolar peaks detected.");
        if peaks.is_empty() {
            return Ok(Vec::new());
        }

        let parents = apolar.islands(self.config.parent_threshold());
        let mut locations = Vec::with_capacity(peaks.len());
        for (n, &peak) in peaks.iter().enumerate() {
            match Location::build(n, apolar, peak, &parents, self.config) {
                Ok(location) => locations.push(location),
                Err(e @ EngineError::NoParentRegion { .. }) => warn!("{e}"),
                Err(e) => return Err(e),
            }
        }
        Ok(locations)
    }

    /// Features of every channel except apolar, in channel order.
    pub fn features(&self) -> Result<Vec<Feature>, EngineError> {
        let partners = self.result.protein.as_deref().map(PartnerIndex::new);
        let mut features = Vec::new();
        for (&channel, grid) in &self.result.super_grids {
            if channel == Channel::Apolar {
                continue;
            }
            let found = feature::detect_features(
                channel,
                grid,
                self.result.probes(channel),
                partners.as_ref(),
                self.config,
            )?;
            debug!(channel = %channel, features = found.len(), "Features detected.");
            features.extend(found);
        }
        Ok(features)
    }

    #[instrument(skip_all, name = "hotspot_extraction", fields(mode = %self.config.mode))]
    pub fn extract(&self) -> Result<Vec<ExtractedHotspot>, EngineError> {
        let locations = self.locations()?;
        if locations.is_empty() {
            info!("No apolar peak above the cutoff; nothing to extract.");
            return Ok(Vec::new());
        }
        let features = self.features()?;
        let assigned = assign_features(&locations, features, self.config);

        let mut hotspots = Vec::with_capacity(locations.len());
        for (n, (location, features)) in locations.into_iter().zip(assigned).enumerate() {
            let result = self.composite(&location, &features)?;
            hotspots.push(ExtractedHotspot {
                identifier: n,
                peak: location.peak,
                peak_score: location.peak_score,
                result,
                features,
            });
        }
        info!(hotspots = hotspots.len(), "Hotspots extracted.");
        Ok(hotspots)
    }

    fn composite(&self, location: &Location, features: &[Feature]) -> Result<HotspotResult, EngineError> {
        let mut grids = BTreeMap::new();
        let mut probes: BTreeMap<Channel, Vec<SampledProbe>> = BTreeMap::new();
        for &channel in self.result.super_grids.keys() {
            if channel == Channel::Apolar {
                grids.insert(channel, location.region.clone());
                continue;
            }
            let of_channel: Vec<&Feature> = features.iter().filter(|f| f.channel == channel).collect();
            let islands: Vec<&Grid> = of_channel.iter().map(|f| &f.island).collect();
            let grid = if islands.is_empty() {
                location.region.copy_and_clear()
            } else {
                Grid::super_grid(COMPOSITE_PADDING, &islands)?
            };
            grids.insert(channel, grid);
            probes.insert(
                channel,
                of_channel.iter().flat_map(|f| f.probes.iter().cloned()).collect(),
            );
        }

        let mut result = HotspotResult::new(grids).with_sampled_probes(probes);
        result.protein = self.result.protein.clone();
        result.buriedness = self.result.buriedness.clone();
        Ok(result)
    }
}

/// Gives each feature to the in-range location holding the largest share of its probes.
///
/// A location is in range when its peak is closer than `config.distance_cutoff` to the
/// feature's point. The first in-range location wins ties. Features with nothing in range
/// are dropped.
fn assign_features(
    locations: &[Location],
    features: Vec<Feature>,
    config: &ExtractionConfig,
) -> Vec<Vec<Feature>> {
    let mut assigned: Vec<Vec<Feature>> = vec![Vec::new(); locations.len()];
    for feature in features {
        let mut best: Option<(usize, f64)> = None;
        for (n, location) in locations.iter().enumerate() {
            if distance(&location.peak, &feature.point) >= config.distance_cutoff {
                continue;
            }
            let score = feature.occupancy(|p| location.contains(p));
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((n, score));
            }
        }
        match best {
            Some((n, score)) => {
                debug!(
                    feature = %feature.identifier,
                    location = locations[n].identifier,
                    score,
                    "Feature assigned."
                );
                assigned[n].push(feature);
            }
            None => warn!(
                "{}",
                EngineError::UnassignableFeature {
                    feature: feature.identifier.clone(),
                    distance: config.distance_cutoff,
                }
            ),
        }
    }
    assigned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use crate::core::models::atom::Atom;
    use crate::core::models::molecule::{Molecule, Residue};

    /// A 41³ grid centred on the origin.
    fn empty_field() -> Grid {
        Grid::new(Point3::new(-10.0, -10.0, -10.0), GRID_SPACING, [41, 41, 41]).unwrap()
    }

    fn bump(centre: Point3<f64>, height: f64) -> Grid {
        let mut g = empty_field();
        let frame = g.clone();
        for ((i, j, k), v) in g.values_mut().indexed_iter_mut() {
            let d = distance(&frame.indices_to_point([i, j, k]), &centre);
            *v = height * (-d * d / 4.5).exp();
        }
        g
    }

    fn location_at(peak: Point3<f64>) -> Location {
        let mut region = empty_field();
        if let Some(idx) = region.indices_of(&peak) {
            region.set_value(idx, 1.0);
        }
        Location {
            identifier: 0,
            peak,
            peak_score: 20.0,
            region,
        }
    }

    fn feature_at(name: &str, point: Point3<f64>, probes: Vec<SampledProbe>) -> Feature {
        Feature {
            identifier: name.to_string(),
            channel: Channel::Donor,
            island: empty_field(),
            point,
            score: 20.0,
            probes,
            hbond_partner: None,
        }
    }

    fn probe_at(position: Point3<f64>) -> SampledProbe {
        let mut m = Molecule::new("probe");
        m.add_residue(Residue::new("PRB", 'P', 1, true));
        m.add_atom(Atom::new(1, "N1", "N", position));
        SampledProbe {
            molecule: m,
            anchor: 0,
            score: 20.0,
        }
    }

    #[test]
    fn an_empty_apolar_map_yields_nothing() {
        let mut grids = BTreeMap::new();
        grids.insert(Channel::Apolar, empty_field());
        grids.insert(Channel::Donor, bump(Point3::origin(), 20.0));
        let result = HotspotResult::new(grids);
        let config = ExtractionConfig::default();
        let extractor = HotspotExtractor::new(&result, &config);
        assert!(extractor.locations().unwrap().is_empty());
        assert!(result.extract_hotspots(&config).unwrap().is_empty());
    }

    #[test]
    fn a_single_peak_yields_one_hotspot_without_features() {
        let mut grids = BTreeMap::new();
        grids.insert(Channel::Apolar, bump(Point3::origin(), 20.0));
        let result = HotspotResult::new(grids);
        let hotspots = result.extract_hotspots(&ExtractionConfig::default()).unwrap();

        assert_eq!(hotspots.len(), 1);
        let hotspot = &hotspots[0];
        assert_eq!(hotspot.peak, Point3::origin());
        assert!((hotspot.peak_score - 20.0).abs() < 1e-12);
        assert!(hotspot.features.is_empty());
        assert_eq!(hotspot.result.channels().collect::<Vec<_>>(), vec![Channel::Apolar]);
        assert!(hotspot.result.grid(Channel::Apolar).unwrap().max_value() > 0.0);
    }

    #[test]
    fn missing_apolar_map_is_an_error() {
        let result = HotspotResult::default();
        assert!(matches!(
            result.extract_hotspots(&ExtractionConfig::default()),
            Err(EngineError::MissingChannel(Channel::Apolar))
        ));
    }

    #[test]
    fn features_go_to_the_nearby_location_and_distant_ones_are_dropped() {
        let locations = vec![location_at(Point3::origin())];
        let features = vec![
            feature_at("donor_0", Point3::new(1.0, 0.0, 0.0), Vec::new()),
            feature_at("donor_1", Point3::new(100.0, 0.0, 0.0), Vec::new()),
        ];
        let assigned = assign_features(&locations, features, &ExtractionConfig::default());
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].len(), 1);
        assert_eq!(assigned[0][0].identifier, "donor_0");
    }

    #[test]
    fn probe_occupancy_decides_between_locations_in_range() {
        let mut second = location_at(Point3::new(3.0, 0.0, 0.0));
        second.identifier = 1;
        let locations = vec![location_at(Point3::origin()), second];
        let probes = vec![
            probe_at(Point3::new(3.0, 0.0, 0.0)),
            probe_at(Point3::new(3.0, 0.0, 0.0)),
            probe_at(Point3::origin()),
        ];
        let features = vec![
            feature_at("donor_0", Point3::new(1.0, 0.0, 0.0), probes),
            feature_at("donor_1", Point3::new(1.5, 0.0, 0.0), Vec::new()),
        ];
        let assigned = assign_features(&locations, features, &ExtractionConfig::default());
        assert_eq!(assigned[1].len(), 1);
        assert_eq!(assigned[1][0].identifier, "donor_0");
        // Without probes every location scores zero and the first one wins.
        assert_eq!(assigned[0][0].identifier, "donor_1");
    }

    #[test]
    fn assigned_feature_islands_form_the_composite_map() {
        let mut grids = BTreeMap::new();
        grids.insert(Channel::Apolar, bump(Point3::origin(), 20.0));
        grids.insert(Channel::Donor, bump(Point3::new(1.0, 0.0, 0.0), 20.0));
        grids.insert(Channel::Acceptor, empty_field());
        let result = HotspotResult::new(grids);

        let hotspots = result.extract_hotspots(&ExtractionConfig::default()).unwrap();
        assert_eq!(hotspots.len(), 1);
        let hotspot = &hotspots[0];
        assert_eq!(hotspot.features.len(), 1);
        assert_eq!(hotspot.features[0].channel, Channel::Donor);

        let donor = hotspot.result.grid(Channel::Donor).unwrap();
        assert!((donor.max_value() - 20.0).abs() < 1e-9);
        let acceptor = hotspot.result.grid(Channel::Acceptor).unwrap();
        assert_eq!(acceptor.max_value(), 0.0);
        assert!(acceptor.same_frame(hotspot.result.grid(Channel::Apolar).unwrap()));
        assert!(hotspot.result.probes(Channel::Donor).is_empty());
    }
}
