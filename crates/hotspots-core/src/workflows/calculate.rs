use super::sample;
use crate::core::grid::Grid;
use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use crate::core::probes::library::ProbeLibrary;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::CalculationConfig;
use crate::engine::error::EngineError;
use crate::engine::external::ghecom::Ghecom;
use crate::engine::external::superstar::Superstar;
use crate::engine::external::{PropensityTool, run_propensity_jobs};
use crate::engine::progress::ProgressReporter;
use crate::engine::result::HotspotResult;
use crate::engine::weighting::{PropensityMaps, weight_all};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, instrument};

/// Computes hotspot maps for `protein` with the configured propensity tool.
#[instrument(skip_all, name = "calculation_workflow", fields(protein = protein.name()))]
pub fn run(
    protein: &Molecule,
    config: &CalculationConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<HotspotResult, EngineError> {
    let tool = Superstar::new(config.propensity.clone(), config.job_timeout);
    run_with_tool(&tool, protein, config, reporter, cancel)
}

/// [`run`] with an arbitrary propensity tool.
///
/// Phases: preparation (probe library, working directory), propensity jobs on the worker pool,
/// the optional secondary buriedness scan, weighting and probe sampling. Any failed
/// propensity job fails the calculation with that job's error once the whole batch has
/// finished.
pub fn run_with_tool(
    tool: &dyn PropensityTool,
    protein: &Molecule,
    config: &CalculationConfig,
    reporter: &ProgressReporter,
    cancel: &CancellationToken,
) -> Result<HotspotResult, EngineError> {
    // === Phase 0: Preparation ===
    let (library, root) = reporter.phase("Preparation", || {
        let library = ProbeLibrary::load(&config.probe_library_path)?;
        let root = working_directory(config.working_directory.as_deref())?;
        Ok::<_, EngineError>((library, root))
    })?;
    let channels = sample::channels(config.charged_probes);
    let probes = sample::resolve_probes(&library, &channels, config.probe_size)?;
    info!(
        channels = channels.len(),
        directory = %root.display(),
        "Starting hotspot calculation."
    );

    // === Phase 1: Propensity maps ===
    let maps = reporter.phase("Propensity Maps", || {
        let outcomes =
            run_propensity_jobs(tool, protein, &channels, &root, config.workers, reporter, cancel)?;
        let mut maps: BTreeMap<Channel, PropensityMaps> = BTreeMap::new();
        for (channel, outcome) in outcomes {
            maps.insert(channel, outcome?);
        }
        Ok::<_, EngineError>(maps)
    })?;
    cancel.check()?;

    // === Phase 2: Secondary buriedness (optional) ===
    let secondary = match &config.buriedness_executable {
        Some(executable) => Some(reporter.phase("Buriedness", || {
            secondary_buriedness(executable, protein, &maps, &root, config, cancel)
        })?),
        None => None,
    };

    // === Phase 3: Weighting ===
    let weighted = reporter.phase("Weighting", || {
        weight_all(&maps, secondary.as_ref()).map_err(EngineError::from)
    })?;

    // === Phase 4: Sampling ===
    let result = sample::run(&weighted, &probes, &config.sampler, reporter, cancel)?
        .with_protein(Arc::new(protein.clone()));

    info!(
        score = result.hotspot_score(),
        "Hotspot calculation complete."
    );
    Ok(result)
}

/// Runs the buriedness scan on the apolar job's ligsite frame.
fn secondary_buriedness(
    executable: &Path,
    protein: &Molecule,
    maps: &BTreeMap<Channel, PropensityMaps>,
    root: &Path,
    config: &CalculationConfig,
    cancel: &CancellationToken,
) -> Result<Grid, EngineError> {
    let template = maps
        .get(&Channel::Apolar)
        .or_else(|| maps.values().next())
        .map(|m| m.ligsite.copy_and_clear());
    Ghecom::new(executable.to_path_buf(), config.job_timeout).run(
        protein,
        template.as_ref(),
        &root.join("ghecom"),
        cancel,
    )
}

/// The configured directory, or a fresh one under the system temp directory.
fn working_directory(configured: Option<&Path>) -> Result<PathBuf, EngineError> {
    let dir = match configured {
        Some(dir) => dir.to_path_buf(),
        None => {
            let stamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or_default();
            std::env::temp_dir().join(format!("hotspots-{}-{stamp}", std::process::id()))
        }
    };
    fs::create_dir_all(&dir).map_err(|e| EngineError::io(&dir, e))?;
    Ok(dir)
}
