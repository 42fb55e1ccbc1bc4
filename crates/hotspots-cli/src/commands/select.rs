use crate::cli::SelectArgs;
use crate::config::PartialConfig;
use crate::error::{CliError, Result};
use hotspots::core::io::{grd::GrdFile, traits::GridFile};
use hotspots::engine::result::HotspotResult;
use tracing::info;

pub fn run(args: SelectArgs) -> Result<()> {
    let config = PartialConfig::load(args.config.as_deref())?.selection_config(&args)?;

    info!("Loading hotspot result from {:?}", &args.input);
    let result = HotspotResult::load(&args.input)?;

    let exclusion = match &args.exclude {
        Some(path) => {
            info!("Loading exclusion grid from {:?}", path);
            Some(GrdFile::read_from_path(path).map_err(|e| CliError::FileParsing {
                path: path.clone(),
                source: e.into(),
            })?)
        }
        None => None,
    };

    let selection = result.best_continuous_volume(&config, exclusion.as_ref())?;
    selection.selected.save(&args.output.join("bcv"))?;
    selection.remaining.save(&args.output.join("remaining"))?;

    println!(
        "✓ Selected {} cell(s) above {:.2} (target {:.0} Å³) into {}",
        selection.cells,
        selection.cutoff,
        config.volume,
        args.output.join("bcv").display()
    );
    Ok(())
}
