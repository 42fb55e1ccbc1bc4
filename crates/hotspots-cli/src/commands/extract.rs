use crate::cli::ExtractArgs;
use crate::config::PartialConfig;
use crate::error::Result;
use hotspots::engine::pharmacophore::ExportFormat;
use hotspots::engine::result::HotspotResult;
use std::str::FromStr;
use tracing::{info, warn};

pub fn run(args: ExtractArgs) -> Result<()> {
    let format = ExportFormat::from_str(&args.pharmacophore_format)?;
    let config = PartialConfig::load(args.config.as_deref())?.extraction_config(&args)?;

    info!("Loading hotspot result from {:?}", &args.input);
    let result = HotspotResult::load(&args.input)?;
    let hotspots = result.extract_hotspots(&config)?;

    if hotspots.is_empty() {
        warn!("No apolar peak passed the extraction cutoff.");
        println!("Warning: no hotspots found above cutoff {:.1}.", config.cutoff);
        return Ok(());
    }

    std::fs::create_dir_all(&args.output)?;
    println!("Writing {} hotspot(s)...", hotspots.len());
    for hotspot in &hotspots {
        let name = format!("hotspot_{}", hotspot.identifier);
        let dir = args.output.join(&name);
        hotspot.result.save(&dir)?;

        let model = hotspot.result.pharmacophore(&name, &config);
        let extension = args.pharmacophore_format.trim_start_matches('.');
        let path = dir.join(format!("pharmacophore.{}", extension));
        let mut writer = std::io::BufWriter::new(std::fs::File::create(&path)?);
        model.write_to(format, &mut writer)?;

        println!(
            "  {} peak ({:.1}, {:.1}, {:.1}) score {:.2}, {} feature(s) -> {}",
            name,
            hotspot.peak.x,
            hotspot.peak.y,
            hotspot.peak.z,
            hotspot.peak_score,
            hotspot.features.len(),
            dir.display()
        );
    }
    Ok(())
}
