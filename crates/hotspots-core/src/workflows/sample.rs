use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use crate::core::probes::library::ProbeLibrary;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::SamplerConfig;
use crate::engine::error::EngineError;
use crate::engine::progress::ProgressReporter;
use crate::engine::result::HotspotResult;
use crate::engine::sampler::sample_channels;
use crate::engine::weighting::WeightedMaps;
use std::collections::BTreeMap;
use tracing::{info, instrument};

/// The channels sampled for a calculation.
pub fn channels(charged_probes: bool) -> Vec<Channel> {
    if charged_probes {
        Channel::ALL.to_vec()
    } else {
        Channel::NEUTRAL.to_vec()
    }
}

/// Looks up one probe per channel.
///
/// # Errors
///
/// Returns [`EngineError::ProbeNotFound`] for the first channel the library cannot serve.
pub fn resolve_probes<'a>(
    library: &'a ProbeLibrary,
    channels: &[Channel],
    size: usize,
) -> Result<Vec<(Channel, &'a Molecule)>, EngineError> {
    channels
        .iter()
        .map(|&channel| {
            library
                .get(channel, size)
                .map(|probe| (channel, probe))
                .ok_or(EngineError::ProbeNotFound { channel, size })
        })
        .collect()
}

/// Samples `probes` over already weighted maps and wraps the output maps in a result.
///
/// The result carries the retained poses and the burial map the maps were weighted with.
#[instrument(skip_all, name = "sampling_workflow", fields(probes = probes.len()))]
pub fn run(
    weighted: &WeightedMaps,
    probes: &[(Channel, &Molecule)],
    config: &SamplerConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<HotspotResult, EngineError> {
    let outcomes = reporter.phase("Probe Sampling", || {
        sample_channels(&weighted.grids, probes, config, reporter, cancel)
    })?;

    let mut grids = BTreeMap::new();
    let mut sampled = BTreeMap::new();
    for (channel, outcome) in outcomes {
        grids.insert(channel, outcome.grid);
        sampled.insert(channel, outcome.probes);
    }
    info!(channels = grids.len(), "Sampling complete.");

    let mut result = HotspotResult::new(grids).with_sampled_probes(sampled);
    if let Some(buriedness) = &weighted.buriedness {
        result = result.with_buriedness(buriedness.clone());
    }
    Ok(result)
}
