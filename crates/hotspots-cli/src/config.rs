use crate::cli::{CalculateArgs, ExtractArgs, SelectArgs};
use crate::error::{CliError, Result};
use hotspots::engine::config as core_config;
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileToolConfig {
    executable: Option<PathBuf>,
    #[serde(default)]
    env: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileCalculationConfig {
    probe_library: Option<PathBuf>,
    probe_size: Option<usize>,
    charged_probes: Option<bool>,
    workers: Option<usize>,
    working_directory: Option<PathBuf>,
    job_timeout_seconds: Option<f64>,
    cavity_origin: Option<[f64; 3]>,
    superstar: Option<FileToolConfig>,
    ghecom: Option<FileToolConfig>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileSamplingConfig {
    rotations: Option<usize>,
    apolar_translation_threshold: Option<f64>,
    polar_translation_threshold: Option<f64>,
    polar_contributions: Option<bool>,
    min_score: Option<f64>,
    retain_score: Option<f64>,
    max_poses: Option<usize>,
    seed: Option<u64>,
    batch_size: Option<usize>,
    deadline_seconds: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileExtractionConfig {
    mode: Option<String>,
    cutoff: Option<f64>,
    volume: Option<f64>,
    min_peak_distance: Option<usize>,
    feature_cutoff: Option<f64>,
    min_feature_points: Option<usize>,
    distance_cutoff: Option<f64>,
    max_hbond_distance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct FileSelectionConfig {
    volume: Option<f64>,
    upper_cutoff: Option<f64>,
    xtol: Option<f64>,
}

/// Settings read from a TOML file, before command-line overrides and library defaults.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    calculation: Option<FileCalculationConfig>,
    sampling: Option<FileSamplingConfig>,
    extraction: Option<FileExtractionConfig>,
    selection: Option<FileSelectionConfig>,
}

impl PartialConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// The file at `path`, or an empty configuration.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn calculation_config(
        mut self,
        args: &CalculateArgs,
    ) -> Result<core_config::CalculationConfig> {
        self.apply_set_values(&args.set_values)?;
        let sampler = self.sampler_config(args.rotations, args.seed)?;
        let file = self.calculation.take().unwrap_or_default();
        let superstar = file.superstar.unwrap_or_default();

        let probe_library = args.probes.clone().or(file.probe_library).ok_or_else(|| {
            CliError::Config(
                "A probe library is required: set `calculation.probe-library` or pass --probes."
                    .to_string(),
            )
        })?;
        let executable = args.superstar.clone().or(superstar.executable).ok_or_else(|| {
            CliError::Config(
                "The propensity tool is required: set `calculation.superstar.executable` or pass --superstar."
                    .to_string(),
            )
        })?;

        let mut builder = core_config::CalculationConfigBuilder::new()
            .probe_library_path(probe_library)
            .propensity_executable(executable)
            .charged_probes(args.charged || file.charged_probes.unwrap_or(false))
            .sampler(sampler);
        for (key, value) in &superstar.env {
            builder = builder.propensity_env(key, value);
        }
        if let Some(size) = file.probe_size {
            builder = builder.probe_size(size);
        }
        if let Some(workers) = args.workers.or(file.workers) {
            builder = builder.workers(workers);
        }
        if let Some(dir) = file.working_directory {
            builder = builder.working_directory(dir);
        }
        if let Some(seconds) = file.job_timeout_seconds {
            builder = builder.job_timeout(seconds_to_duration("job-timeout-seconds", seconds)?);
        }
        let cavity = match &args.cavity_origin {
            Some(values) => Some(cavity_point(values)?),
            None => file.cavity_origin.map(|[x, y, z]| Point3::new(x, y, z)),
        };
        if let Some(origin) = cavity {
            builder = builder.cavity_origin(origin);
        }
        if let Some(executable) = args
            .ghecom
            .clone()
            .or(file.ghecom.and_then(|g| g.executable))
        {
            builder = builder.buriedness_executable(executable);
        }

        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn extraction_config(mut self, args: &ExtractArgs) -> Result<core_config::ExtractionConfig> {
        self.apply_set_values(&args.set_values)?;
        let file = self.extraction.take().unwrap_or_default();

        let mut builder = core_config::ExtractionConfigBuilder::new();
        if let Some(mode) = args.mode.as_ref().or(file.mode.as_ref()) {
            builder = builder.mode(core_config::ExtractionMode::from_str(mode)?);
        }
        if let Some(cutoff) = args.cutoff.or(file.cutoff) {
            builder = builder.cutoff(cutoff);
        }
        if let Some(volume) = args.volume.or(file.volume) {
            builder = builder.volume(volume);
        }
        if let Some(cells) = file.min_peak_distance {
            builder = builder.min_peak_distance(cells);
        }
        if let Some(cutoff) = file.feature_cutoff {
            builder = builder.feature_cutoff(cutoff);
        }
        if let Some(n) = file.min_feature_points {
            builder = builder.min_feature_points(n);
        }
        if let Some(distance) = file.distance_cutoff {
            builder = builder.distance_cutoff(distance);
        }
        if let Some(distance) = file.max_hbond_distance {
            builder = builder.max_hbond_distance(distance);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    pub fn selection_config(mut self, args: &SelectArgs) -> Result<core_config::SelectionConfig> {
        self.apply_set_values(&args.set_values)?;
        let file = self.selection.take().unwrap_or_default();

        let mut builder = core_config::SelectionConfigBuilder::new();
        if let Some(volume) = args.volume.or(file.volume) {
            builder = builder.volume(volume);
        }
        if let Some(cutoff) = file.upper_cutoff {
            builder = builder.upper_cutoff(cutoff);
        }
        if let Some(xtol) = file.xtol {
            builder = builder.xtol(xtol);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn sampler_config(
        &mut self,
        rotations: Option<usize>,
        seed: Option<u64>,
    ) -> Result<core_config::SamplerConfig> {
        let file = self.sampling.take().unwrap_or_default();
        let mut builder = core_config::SamplerConfigBuilder::new();
        if let Some(n) = rotations.or(file.rotations) {
            builder = builder.rotations(n);
        }
        if let Some(seed) = seed.or(file.seed) {
            builder = builder.seed(seed);
        }
        if let Some(t) = file.apolar_translation_threshold {
            builder = builder.apolar_translation_threshold(t);
        }
        if let Some(t) = file.polar_translation_threshold {
            builder = builder.polar_translation_threshold(t);
        }
        if let Some(enabled) = file.polar_contributions {
            builder = builder.polar_contributions(enabled);
        }
        if let Some(score) = file.min_score {
            builder = builder.min_score(score);
        }
        if let Some(score) = file.retain_score {
            builder = builder.retain_score(score);
        }
        if let Some(n) = file.max_poses {
            builder = builder.max_poses(n);
        }
        if let Some(n) = file.batch_size {
            builder = builder.batch_size(n);
        }
        if let Some(seconds) = file.deadline_seconds {
            builder = builder.deadline(seconds_to_duration("deadline-seconds", seconds)?);
        }
        builder.build().map_err(|e| CliError::Config(e.to_string()))
    }

    fn calculation(&mut self) -> &mut FileCalculationConfig {
        self.calculation.get_or_insert_with(Default::default)
    }

    fn sampling(&mut self) -> &mut FileSamplingConfig {
        self.sampling.get_or_insert_with(Default::default)
    }

    fn extraction(&mut self) -> &mut FileExtractionConfig {
        self.extraction.get_or_insert_with(Default::default)
    }

    fn selection(&mut self) -> &mut FileSelectionConfig {
        self.selection.get_or_insert_with(Default::default)
    }

    fn apply_set_values(&mut self, set_values: &[String]) -> Result<()> {
        for kv_pair in set_values {
            let Some((key, value)) = kv_pair.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid --set format: '{}'. Expected KEY=VALUE.",
                    kv_pair
                )));
            };
            let (key, value) = (key.trim(), value.trim());

            match key {
                "calculation.probe-library" => {
                    self.calculation().probe_library = Some(PathBuf::from(value))
                }
                "calculation.probe-size" => self.calculation().probe_size = Some(parse(key, value)?),
                "calculation.charged-probes" => {
                    self.calculation().charged_probes = Some(parse(key, value)?)
                }
                "calculation.workers" => self.calculation().workers = Some(parse(key, value)?),
                "calculation.working-directory" => {
                    self.calculation().working_directory = Some(PathBuf::from(value))
                }
                "calculation.job-timeout-seconds" => {
                    self.calculation().job_timeout_seconds = Some(parse(key, value)?)
                }
                "sampling.rotations" => self.sampling().rotations = Some(parse(key, value)?),
                "sampling.apolar-translation-threshold" => {
                    self.sampling().apolar_translation_threshold = Some(parse(key, value)?)
                }
                "sampling.polar-translation-threshold" => {
                    self.sampling().polar_translation_threshold = Some(parse(key, value)?)
                }
                "sampling.polar-contributions" => {
                    self.sampling().polar_contributions = Some(parse(key, value)?)
                }
                "sampling.min-score" => self.sampling().min_score = Some(parse(key, value)?),
                "sampling.retain-score" => self.sampling().retain_score = Some(parse(key, value)?),
                "sampling.max-poses" => self.sampling().max_poses = Some(parse(key, value)?),
                "sampling.seed" => self.sampling().seed = Some(parse(key, value)?),
                "sampling.batch-size" => self.sampling().batch_size = Some(parse(key, value)?),
                "sampling.deadline-seconds" => {
                    self.sampling().deadline_seconds = Some(parse(key, value)?)
                }
                "extraction.mode" => self.extraction().mode = Some(value.to_string()),
                "extraction.cutoff" => self.extraction().cutoff = Some(parse(key, value)?),
                "extraction.volume" => self.extraction().volume = Some(parse(key, value)?),
                "extraction.min-peak-distance" => {
                    self.extraction().min_peak_distance = Some(parse(key, value)?)
                }
                "extraction.feature-cutoff" => {
                    self.extraction().feature_cutoff = Some(parse(key, value)?)
                }
                "extraction.min-feature-points" => {
                    self.extraction().min_feature_points = Some(parse(key, value)?)
                }
                "extraction.distance-cutoff" => {
                    self.extraction().distance_cutoff = Some(parse(key, value)?)
                }
                "extraction.max-hbond-distance" => {
                    self.extraction().max_hbond_distance = Some(parse(key, value)?)
                }
                "selection.volume" => self.selection().volume = Some(parse(key, value)?),
                "selection.upper-cutoff" => self.selection().upper_cutoff = Some(parse(key, value)?),
                "selection.xtol" => self.selection().xtol = Some(parse(key, value)?),
                _ => {
                    return Err(CliError::Config(format!(
                        "Unsupported configuration key for --set: '{}'",
                        key
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| CliError::Config(format!("Invalid value for {}: {}", key, value)))
}

fn seconds_to_duration(key: &str, seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| CliError::Config(format!("Invalid duration for {}: {}", key, e)))
}

fn cavity_point(values: &[f64]) -> Result<Point3<f64>> {
    match values {
        [x, y, z] => Ok(Point3::new(*x, *y, *z)),
        _ => Err(CliError::Argument(format!(
            "--cavity-origin expects three coordinates, got {}",
            values.len()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;
    use std::fs;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("hotspots.toml");
        fs::write(&path, content).unwrap();
        path
    }

    fn calculate_args(extra: &[&str]) -> CalculateArgs {
        let mut argv = vec!["hotspots", "calculate", "-i", "protein.pdb", "-o", "out"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Calculate(args) => args,
            other => panic!("expected calculate, got {other:?}"),
        }
    }

    const CALCULATION: &str = r#"
        [calculation]
        probe-library = "data/probes.toml"
        workers = 3
        job-timeout-seconds = 600
        cavity-origin = [1.0, 2.0, 3.0]

        [calculation.superstar]
        executable = "/opt/superstar/bin/superstar"
        env = { SUPERSTAR_ROOT = "/opt/superstar" }

        [sampling]
        rotations = 500
        seed = 42
    "#;

    #[test]
    fn file_values_are_merged_with_library_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, CALCULATION);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .calculation_config(&calculate_args(&[]))
            .unwrap();

        assert_eq!(config.probe_library_path, PathBuf::from("data/probes.toml"));
        assert_eq!(config.workers, 3);
        assert_eq!(config.probe_size, 7);
        assert_eq!(config.job_timeout, Some(Duration::from_secs(600)));
        assert_eq!(config.propensity.cavity_origin, Some(Point3::new(1.0, 2.0, 3.0)));
        assert_eq!(
            config.propensity.env.get("SUPERSTAR_ROOT").map(String::as_str),
            Some("/opt/superstar")
        );
        assert_eq!(config.sampler.rotations, 500);
        assert_eq!(config.sampler.seed, Some(42));
        assert_eq!(config.sampler.max_poses, 10_000);
        assert!(config.buriedness_executable.is_none());
    }

    #[test]
    fn cli_arguments_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, CALCULATION);
        let args = calculate_args(&[
            "--rotations",
            "50",
            "--workers",
            "1",
            "--cavity-origin",
            "0,0,0",
            "--ghecom",
            "/opt/ghecom/ghecom",
            "--charged",
        ]);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .calculation_config(&args)
            .unwrap();

        assert_eq!(config.sampler.rotations, 50);
        assert_eq!(config.workers, 1);
        assert_eq!(config.propensity.cavity_origin, Some(Point3::origin()));
        assert_eq!(
            config.buriedness_executable,
            Some(PathBuf::from("/opt/ghecom/ghecom"))
        );
        assert!(config.charged_probes);
    }

    #[test]
    fn cavity_origin_needs_exactly_three_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, CALCULATION);
        let args = calculate_args(&["--cavity-origin", "1,2"]);
        let err = PartialConfig::from_file(&path)
            .unwrap()
            .calculation_config(&args)
            .unwrap_err();
        assert!(matches!(err, CliError::Argument(msg) if msg.contains("got 2")));
    }

    #[test]
    fn set_values_override_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, CALCULATION);
        let args = calculate_args(&["-S", "sampling.rotations=20", "-S", "calculation.probe-size=5"]);
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .calculation_config(&args)
            .unwrap();
        assert_eq!(config.sampler.rotations, 20);
        assert_eq!(config.probe_size, 5);
    }

    #[test]
    fn unknown_set_keys_and_bad_values_are_rejected() {
        let args = calculate_args(&["-S", "sampling.temperature=3"]);
        let err = PartialConfig::default().calculation_config(&args).unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("sampling.temperature")));

        let args = calculate_args(&["-S", "sampling.rotations=many"]);
        let err = PartialConfig::default().calculation_config(&args).unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("many")));
    }

    #[test]
    fn missing_tool_is_a_configuration_error() {
        let args = calculate_args(&["--probes", "probes.toml"]);
        let err = PartialConfig::default().calculation_config(&args).unwrap_err();
        assert!(matches!(err, CliError::Config(msg) if msg.contains("superstar")));
    }

    #[test]
    fn unknown_file_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "[extraction]\npeak-height = 3\n");
        assert!(matches!(
            PartialConfig::from_file(&path),
            Err(CliError::FileParsing { .. })
        ));
    }

    #[test]
    fn extraction_and_selection_settings_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "[extraction]\nmode = \"score\"\ncutoff = 12.5\n\n[selection]\nvolume = 300.0\n",
        );

        let extract = match Cli::parse_from(["hotspots", "extract", "-i", "a", "-o", "b", "--volume", "90"])
            .command
        {
            Commands::Extract(args) => args,
            other => panic!("expected extract, got {other:?}"),
        };
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .extraction_config(&extract)
            .unwrap();
        assert_eq!(config.mode, core_config::ExtractionMode::Score);
        assert_eq!(config.cutoff, 12.5);
        assert_eq!(config.volume, 90.0);

        let select = match Cli::parse_from(["hotspots", "select", "-i", "a", "-o", "b"]).command {
            Commands::Select(args) => args,
            other => panic!("expected select, got {other:?}"),
        };
        let config = PartialConfig::from_file(&path)
            .unwrap()
            .selection_config(&select)
            .unwrap();
        assert_eq!(config.volume, 300.0);
    }

    #[test]
    fn invalid_extraction_mode_is_reported() {
        let extract = match Cli::parse_from(["hotspots", "extract", "-i", "a", "-o", "b", "-m", "peaks"])
            .command
        {
            Commands::Extract(args) => args,
            other => panic!("expected extract, got {other:?}"),
        };
        let err = PartialConfig::default().extraction_config(&extract).unwrap_err();
        assert!(matches!(err, CliError::Hotspots(_)));
    }
}
