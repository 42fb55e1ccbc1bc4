use crate::cli::CalculateArgs;
use crate::config::PartialConfig;
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use hotspots::{
    core::io::{pdb::PdbFile, traits::MolecularFile},
    core::models::channel::Channel,
    engine::{cancel::CancellationToken, progress::ProgressReporter},
    workflows,
};
use tracing::info;

pub fn run(args: CalculateArgs, quiet: bool) -> Result<()> {
    let partial_config = PartialConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let config = partial_config.calculation_config(&args)?;

    info!("Loading protein structure from {:?}", &args.input);
    let protein = PdbFile::read_from_path(&args.input).map_err(|e| CliError::FileParsing {
        path: args.input.clone(),
        source: e.into(),
    })?;
    info!(atoms = protein.len(), "Protein loaded.");

    let progress_handler = CliProgressHandler::new(quiet);
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());
    let cancel = CancellationToken::new();

    println!("Calculating hotspot maps...");
    let result = workflows::calculate::run(&protein, &config, &reporter, &cancel)?;

    result.save(&args.output)?;
    println!("✓ Hotspot maps written to: {}", args.output.display());
    for channel in result.channels() {
        let grid = result.grid(channel)?;
        println!(
            "  {:<9} max {:>6.2}  probes {}",
            channel.name(),
            grid.max_value(),
            result.probes(channel).len()
        );
    }
    if let Ok(apolar) = result.grid(Channel::Apolar) {
        info!(
            cells = apolar.count_above(0.0),
            score = result.hotspot_score(),
            "Calculation summary."
        );
    }
    Ok(())
}
