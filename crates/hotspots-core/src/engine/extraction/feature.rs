use crate::core::grid::{Grid, GridError};
use crate::core::models::channel::Channel;
use crate::engine::config::ExtractionConfig;
use crate::engine::sampler::SampledProbe;
use crate::engine::utils::partners::PartnerIndex;
use nalgebra::Point3;
use tracing::trace;

/// Padding, in cells, added around a feature's island.
const FEATURE_PADDING: usize = 2;

/// A high-scoring island of one polar or charged channel.
#[derive(Debug, Clone)]
pub struct Feature {
    /// `<channel>_<island index>`, e.g. `donor_0`.
    pub identifier: String,
    pub channel: Channel,
    /// The island, padded on every side.
    pub island: Grid,
    /// Value-weighted centroid of the island.
    pub point: Point3<f64>,
    /// Highest value on the island.
    pub score: f64,
    /// Sampled probes whose anchor atom lies on the island.
    pub probes: Vec<SampledProbe>,
    /// Nearest complementary protein atom, for donor and acceptor features.
    pub hbond_partner: Option<Point3<f64>>,
}

impl Feature {
    /// Share of this feature's probes whose centroid satisfies `inside`; zero without probes.
    pub fn occupancy(&self, inside: impl Fn(&Point3<f64>) -> bool) -> f64 {
        if self.probes.is_empty() {
            return 0.0;
        }
        let hits = self
            .probes
            .iter()
            .filter_map(SampledProbe::centroid)
            .filter(|c| inside(c))
            .count();
        hits as f64 / self.probes.len() as f64
    }
}

/// Features of one channel's map: islands above `config.feature_cutoff` holding more than
/// `config.min_feature_points` cells above `config.cutoff`.
pub(crate) fn detect_features(
    channel: Channel,
    grid: &Grid,
    probes: &[SampledProbe],
    partners: Option<&PartnerIndex>,
    config: &ExtractionConfig,
) -> Result<Vec<Feature>, GridError> {
    let mut features = Vec::new();
    for (n, island) in grid.islands(config.feature_cutoff).iter().enumerate() {
        if island.count_above(config.cutoff) <= config.min_feature_points {
            continue;
        }
        let Some(point) = island.centroid() else {
            continue;
        };
        let padded = Grid::super_grid(FEATURE_PADDING, &[island])?;
        let occupants: Vec<SampledProbe> = probes
            .iter()
            .filter(|p| {
                p.anchor_position()
                    .is_some_and(|a| padded.contains_point(&a, config.probe_tolerance))
            })
            .cloned()
            .collect();
        let hbond_partner = partners
            .and_then(|index| index.nearest_partner(channel, &point, config.max_hbond_distance));

        let feature = Feature {
            identifier: format!("{}_{}", channel.name(), n),
            channel,
            island: padded,
            point,
            score: island.max_value(),
            probes: occupants,
            hbond_partner,
        };
        trace!(
            feature = %feature.identifier,
            probes = feature.probes.len(),
            score = feature.score,
            "Feature detected."
        );
        features.push(feature);
    }
    Ok(features)
}
