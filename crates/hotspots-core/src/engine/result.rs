use super::config::{ExtractionConfig, SelectionConfig};
use super::error::EngineError;
use super::extraction::{ExtractedHotspot, HotspotExtractor};
use super::pharmacophore::PharmacophoreModel;
use super::sampler::SampledProbe;
use super::selection::{VolumeSelection, select_best_continuous_volume};
use crate::core::grid::Grid;
use crate::core::io::grd::GrdFile;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::{GridFile, MolecularFile};
use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const PROTEIN_FILE: &str = "protein.pdb";
const BURIEDNESS_FILE: &str = "buriedness.grd";
/// Percentile of a channel's positive values used as its score.
const SCORE_PERCENTILE: f64 = 75.0;

/// Per-channel hotspot maps with the protein and sampling data they were computed from.
///
/// A result owns its grids. Extraction, selection and selectivity all return new results and
/// leave the source untouched.
#[derive(Debug, Clone, Default)]
pub struct HotspotResult {
    pub super_grids: BTreeMap<Channel, Grid>,
    pub protein: Option<Arc<Molecule>>,
    pub buriedness: Option<Grid>,
    pub sampled_probes: BTreeMap<Channel, Vec<SampledProbe>>,
}

impl HotspotResult {
    pub fn new(super_grids: BTreeMap<Channel, Grid>) -> Self {
        Self {
            super_grids,
            ..Default::default()
        }
    }

    pub fn with_protein(mut self, protein: Arc<Molecule>) -> Self {
        self.protein = Some(protein);
        self
    }

    pub fn with_buriedness(mut self, buriedness: Grid) -> Self {
        self.buriedness = Some(buriedness);
        self
    }

    pub fn with_sampled_probes(mut self, probes: BTreeMap<Channel, Vec<SampledProbe>>) -> Self {
        self.sampled_probes = probes;
        self
    }

    pub fn grid(&self, channel: Channel) -> Result<&Grid, EngineError> {
        self.super_grids
            .get(&channel)
            .ok_or(EngineError::MissingChannel(channel))
    }

    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.super_grids.keys().copied()
    }

    pub fn probes(&self, channel: Channel) -> &[SampledProbe] {
        self.sampled_probes
            .get(&channel)
            .map_or(&[], |probes| probes.as_slice())
    }

    /// Splits the maps into fragment-sized hotspots around the apolar peaks.
    pub fn extract_hotspots(
        &self,
        config: &ExtractionConfig,
    ) -> Result<Vec<ExtractedHotspot>, EngineError> {
        HotspotExtractor::new(self, config).extract()
    }

    /// The best connected region of `config.volume` and everything outside it.
    pub fn best_continuous_volume(
        &self,
        config: &SelectionConfig,
        exclusion_mask: Option<&Grid>,
    ) -> Result<VolumeSelection, EngineError> {
        select_best_continuous_volume(self, config, exclusion_mask)
    }

    /// Per-channel difference `self − other` on a common frame, highlighting interactions
    /// favoured here and absent in `other`. Only channels present in both are kept.
    pub fn selectivity_map(&self, other: &HotspotResult) -> Result<HotspotResult, EngineError> {
        let mut grids = BTreeMap::new();
        for (&channel, grid) in &self.super_grids {
            let Some(off_target) = other.super_grids.get(&channel) else {
                debug!(channel = %channel, "Channel missing from the off-target result.");
                continue;
            };
            let (a, b) = Grid::common_grid(grid, off_target, 1)?;
            grids.insert(channel, a.try_sub(&b)?);
        }
        let mut out = HotspotResult::new(grids);
        out.protein = self.protein.clone();
        Ok(out)
    }

    /// Mean over channels of the 75th percentile of each channel's positive values. Channels
    /// without positive values are ignored; an empty result scores zero.
    pub fn hotspot_score(&self) -> f64 {
        let scores: Vec<f64> = self
            .super_grids
            .values()
            .map(|g| g.percentile_score(SCORE_PERCENTILE, 0.0))
            .filter(|&s| s > 0.0)
            .collect();
        if scores.is_empty() {
            0.0
        } else {
            scores.iter().sum::<f64>() / scores.len() as f64
        }
    }

    pub fn pharmacophore(&self, identifier: &str, config: &ExtractionConfig) -> PharmacophoreModel {
        PharmacophoreModel::from_result(self, identifier, config)
    }

    /// Writes `<channel>.grd` per channel, plus `protein.pdb` and `buriedness.grd` when
    /// present. The directory is created if needed.
    pub fn save(&self, dir: &Path) -> Result<(), EngineError> {
        std::fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
        for (channel, grid) in &self.super_grids {
            let path = dir.join(format!("{}.grd", channel.name()));
            GrdFile::write_to_path(grid, channel.name(), &path)?;
        }
        if let Some(buriedness) = &self.buriedness {
            GrdFile::write_to_path(buriedness, "buriedness", dir.join(BURIEDNESS_FILE))?;
        }
        if let Some(protein) = &self.protein {
            PdbFile::write_to_path(protein, dir.join(PROTEIN_FILE))?;
        }
        info!(
            path = %dir.display(),
            channels = self.super_grids.len(),
            "Saved hotspot result."
        );
        Ok(())
    }

    /// Reads a directory written by [`HotspotResult::save`].
    ///
    /// The neutral channels are required; charged channels, the burial map and the protein
    /// are loaded when their files exist. Sampled probes are not persisted.
    pub fn load(dir: &Path) -> Result<Self, EngineError> {
        let mut super_grids = BTreeMap::new();
        for channel in Channel::ALL {
            let path = dir.join(format!("{}.grd", channel.name()));
            if path.is_file() {
                super_grids.insert(channel, GrdFile::read_from_path(&path)?);
            } else if !channel.is_charged() {
                return Err(EngineError::MissingChannel(channel));
            }
        }
        let mut result = HotspotResult::new(super_grids);

        let buriedness = dir.join(BURIEDNESS_FILE);
        if buriedness.is_file() {
            result.buriedness = Some(GrdFile::read_from_path(&buriedness)?);
        }
        let protein = dir.join(PROTEIN_FILE);
        if protein.is_file() {
            result.protein = Some(Arc::new(PdbFile::read_from_path(&protein)?));
        }
        debug!(
            path = %dir.display(),
            channels = result.super_grids.len(),
            "Loaded hotspot result."
        );
        Ok(result)
    }
}
