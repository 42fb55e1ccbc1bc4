use super::error::EngineError;
use nalgebra::Point3;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

fn require_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be a positive number, got {value}"),
        })
    }
}

fn require_finite(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: format!("must be finite, got {value}"),
        })
    }
}

fn require_nonzero(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value > 0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            reason: "must be greater than zero".to_string(),
        })
    }
}

// --- Probe sampling ---

/// Monte-Carlo probe sampling settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Random orientations tried per probe (default 3000).
    pub rotations: usize,
    /// Islands of the apolar map above this value supply translation targets (default 15).
    pub apolar_translation_threshold: f64,
    /// Same for donor, acceptor and charged maps (default 15).
    pub polar_translation_threshold: f64,
    /// Whether probes carrying polar atoms also write their apolar atoms to the apolar map
    /// (default false).
    pub polar_contributions: bool,
    /// Poses scoring below this are skipped entirely (default 5).
    pub min_score: f64,
    /// Poses scoring above this are retained as sampled probes (default 14).
    pub retain_score: f64,
    /// Upper bound on retained poses per probe (default 10 000).
    pub max_poses: usize,
    /// Seed for the rotation generator; `None` draws from entropy.
    pub seed: Option<u64>,
    /// Rotations processed per worker batch (default 64).
    pub batch_size: usize,
    /// Wall-clock budget for one probe's sampling.
    pub deadline: Option<Duration>,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            rotations: 3000,
            apolar_translation_threshold: 15.0,
            polar_translation_threshold: 15.0,
            polar_contributions: false,
            min_score: 5.0,
            retain_score: 14.0,
            max_poses: 10_000,
            seed: None,
            batch_size: 64,
            deadline: None,
        }
    }
}

impl SamplerConfig {
    pub fn translation_threshold(&self, apolar: bool) -> f64 {
        if apolar {
            self.apolar_translation_threshold
        } else {
            self.polar_translation_threshold
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("rotations", self.rotations)?;
        require_nonzero("max_poses", self.max_poses)?;
        require_nonzero("batch_size", self.batch_size)?;
        require_finite("apolar_translation_threshold", self.apolar_translation_threshold)?;
        require_finite("polar_translation_threshold", self.polar_translation_threshold)?;
        require_finite("min_score", self.min_score)?;
        require_finite("retain_score", self.retain_score)
    }
}

#[derive(Default)]
pub struct SamplerConfigBuilder {
    rotations: Option<usize>,
    apolar_translation_threshold: Option<f64>,
    polar_translation_threshold: Option<f64>,
    polar_contributions: Option<bool>,
    min_score: Option<f64>,
    retain_score: Option<f64>,
    max_poses: Option<usize>,
    seed: Option<u64>,
    batch_size: Option<usize>,
    deadline: Option<Duration>,
}

impl SamplerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rotations(mut self, n: usize) -> Self {
        self.rotations = Some(n);
        self
    }
    pub fn apolar_translation_threshold(mut self, threshold: f64) -> Self {
        self.apolar_translation_threshold = Some(threshold);
        self
    }
    pub fn polar_translation_threshold(mut self, threshold: f64) -> Self {
        self.polar_translation_threshold = Some(threshold);
        self
    }
    pub fn polar_contributions(mut self, enabled: bool) -> Self {
        self.polar_contributions = Some(enabled);
        self
    }
    pub fn min_score(mut self, score: f64) -> Self {
        self.min_score = Some(score);
        self
    }
    pub fn retain_score(mut self, score: f64) -> Self {
        self.retain_score = Some(score);
        self
    }
    pub fn max_poses(mut self, n: usize) -> Self {
        self.max_poses = Some(n);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn batch_size(mut self, n: usize) -> Self {
        self.batch_size = Some(n);
        self
    }
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn build(self) -> Result<SamplerConfig, ConfigError> {
        let defaults = SamplerConfig::default();
        let config = SamplerConfig {
            rotations: self.rotations.unwrap_or(defaults.rotations),
            apolar_translation_threshold: self
                .apolar_translation_threshold
                .unwrap_or(defaults.apolar_translation_threshold),
            polar_translation_threshold: self
                .polar_translation_threshold
                .unwrap_or(defaults.polar_translation_threshold),
            polar_contributions: self
                .polar_contributions
                .unwrap_or(defaults.polar_contributions),
            min_score: self.min_score.unwrap_or(defaults.min_score),
            retain_score: self.retain_score.unwrap_or(defaults.retain_score),
            max_poses: self.max_poses.unwrap_or(defaults.max_poses),
            seed: self.seed,
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            deadline: self.deadline,
        };
        config.validate()?;
        Ok(config)
    }
}

// --- Hotspot extraction ---

/// How the sub-region around each peak is carved out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExtractionMode {
    /// Distance-weighted region restricted to a target volume.
    #[default]
    Volume,
    /// Everything above a fixed score, capped at a maximum volume.
    Score,
}

impl FromStr for ExtractionMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "volume" => Ok(ExtractionMode::Volume),
            "score" => Ok(ExtractionMode::Score),
            _ => Err(EngineError::InvalidExtractionMode(s.to_string())),
        }
    }
}

impl fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionMode::Volume => f.write_str("volume"),
            ExtractionMode::Score => f.write_str("score"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub mode: ExtractionMode,
    /// Peaks and feature cells must exceed this score (default 14).
    pub cutoff: f64,
    /// Target volume of each hotspot in volume mode, Å³ (default 75).
    pub volume: f64,
    /// Minimum separation between peaks, in cells (default 6).
    pub min_peak_distance: usize,
    /// Island threshold for polar features (default 12).
    pub feature_cutoff: f64,
    /// A feature needs more than this many cells above `cutoff` (default 10).
    pub min_feature_points: usize,
    /// Features farther than this from every hotspot are dropped, Å (default 8).
    pub distance_cutoff: f64,
    /// Tolerance, in cells, for a probe's anchor to count as inside a feature (default 2).
    pub probe_tolerance: usize,
    /// Tolerance, in cells, for a peak to count as inside its parent island (default 2).
    pub parent_tolerance: usize,
    /// Parent island threshold in score mode (default 17).
    pub score_mode_threshold: f64,
    /// Volume cap in score mode, Å³ (default 400).
    pub max_score_volume: f64,
    /// Smoothing applied to volume-mode regions, in cells (default 0.3).
    pub volume_sigma: f64,
    /// Smoothing applied to score-mode regions, in cells (default 0.2).
    pub score_sigma: f64,
    /// Maximum distance to a protein hydrogen-bond partner, Å (default 5).
    pub max_hbond_distance: f64,
    /// Island threshold for polar pharmacophore features (default 5).
    pub pharmacophore_cutoff: f64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            mode: ExtractionMode::Volume,
            cutoff: 14.0,
            volume: 75.0,
            min_peak_distance: 6,
            feature_cutoff: 12.0,
            min_feature_points: 10,
            distance_cutoff: 8.0,
            probe_tolerance: 2,
            parent_tolerance: 2,
            score_mode_threshold: 17.0,
            max_score_volume: 400.0,
            volume_sigma: 0.3,
            score_sigma: 0.2,
            max_hbond_distance: 5.0,
            pharmacophore_cutoff: 5.0,
        }
    }
}

impl ExtractionConfig {
    /// Threshold for the parent islands peaks are located in.
    pub fn parent_threshold(&self) -> f64 {
        match self.mode {
            ExtractionMode::Volume => self.cutoff - 2.0,
            ExtractionMode::Score => self.score_mode_threshold,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_finite("cutoff", self.cutoff)?;
        require_positive("volume", self.volume)?;
        require_finite("feature_cutoff", self.feature_cutoff)?;
        require_positive("distance_cutoff", self.distance_cutoff)?;
        require_finite("score_mode_threshold", self.score_mode_threshold)?;
        require_positive("max_score_volume", self.max_score_volume)?;
        require_positive("max_hbond_distance", self.max_hbond_distance)?;
        require_finite("volume_sigma", self.volume_sigma)?;
        require_finite("score_sigma", self.score_sigma)?;
        require_finite("pharmacophore_cutoff", self.pharmacophore_cutoff)
    }
}

#[derive(Default)]
pub struct ExtractionConfigBuilder {
    mode: Option<ExtractionMode>,
    cutoff: Option<f64>,
    volume: Option<f64>,
    min_peak_distance: Option<usize>,
    feature_cutoff: Option<f64>,
    min_feature_points: Option<usize>,
    distance_cutoff: Option<f64>,
    max_hbond_distance: Option<f64>,
}

impl ExtractionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = Some(mode);
        self
    }
    pub fn cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = Some(cutoff);
        self
    }
    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
    pub fn min_peak_distance(mut self, cells: usize) -> Self {
        self.min_peak_distance = Some(cells);
        self
    }
    pub fn feature_cutoff(mut self, cutoff: f64) -> Self {
        self.feature_cutoff = Some(cutoff);
        self
    }
    pub fn min_feature_points(mut self, n: usize) -> Self {
        self.min_feature_points = Some(n);
        self
    }
    pub fn distance_cutoff(mut self, distance: f64) -> Self {
        self.distance_cutoff = Some(distance);
        self
    }
    pub fn max_hbond_distance(mut self, distance: f64) -> Self {
        self.max_hbond_distance = Some(distance);
        self
    }

    pub fn build(self) -> Result<ExtractionConfig, ConfigError> {
        let defaults = ExtractionConfig::default();
        let config = ExtractionConfig {
            mode: self.mode.unwrap_or(defaults.mode),
            cutoff: self.cutoff.unwrap_or(defaults.cutoff),
            volume: self.volume.unwrap_or(defaults.volume),
            min_peak_distance: self.min_peak_distance.unwrap_or(defaults.min_peak_distance),
            feature_cutoff: self.feature_cutoff.unwrap_or(defaults.feature_cutoff),
            min_feature_points: self
                .min_feature_points
                .unwrap_or(defaults.min_feature_points),
            distance_cutoff: self.distance_cutoff.unwrap_or(defaults.distance_cutoff),
            max_hbond_distance: self
                .max_hbond_distance
                .unwrap_or(defaults.max_hbond_distance),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

// --- Best continuous volume ---

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionConfig {
    /// Target volume, Å³ (default 500).
    pub volume: f64,
    /// Upper bound of the cutoff search (default 30).
    pub upper_cutoff: f64,
    /// Absolute tolerance of the cutoff search (default 0.025).
    pub xtol: f64,
    /// Solutions at or above this cutoff are treated as saturated (default 29).
    pub saturation_cutoff: f64,
    /// Cutoff used when the search saturates (default 1).
    pub fallback_cutoff: f64,
    /// Objective evaluations allowed to the search (default 500).
    pub max_evaluations: usize,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            volume: 500.0,
            upper_cutoff: 30.0,
            xtol: 0.025,
            saturation_cutoff: 29.0,
            fallback_cutoff: 1.0,
            max_evaluations: 500,
        }
    }
}

impl SelectionConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("volume", self.volume)?;
        require_positive("upper_cutoff", self.upper_cutoff)?;
        require_positive("xtol", self.xtol)?;
        require_finite("saturation_cutoff", self.saturation_cutoff)?;
        require_finite("fallback_cutoff", self.fallback_cutoff)?;
        require_nonzero("max_evaluations", self.max_evaluations)
    }
}

#[derive(Default)]
pub struct SelectionConfigBuilder {
    volume: Option<f64>,
    upper_cutoff: Option<f64>,
    xtol: Option<f64>,
}

impl SelectionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }
    pub fn upper_cutoff(mut self, cutoff: f64) -> Self {
        self.upper_cutoff = Some(cutoff);
        self
    }
    pub fn xtol(mut self, xtol: f64) -> Self {
        self.xtol = Some(xtol);
        self
    }

    pub fn build(self) -> Result<SelectionConfig, ConfigError> {
        let defaults = SelectionConfig::default();
        let config = SelectionConfig {
            volume: self.volume.unwrap_or(defaults.volume),
            upper_cutoff: self.upper_cutoff.unwrap_or(defaults.upper_cutoff),
            xtol: self.xtol.unwrap_or(defaults.xtol),
            ..defaults
        };
        config.validate()?;
        Ok(config)
    }
}

// --- Full calculation ---

/// Settings of the external propensity tool.
#[derive(Debug, Clone, PartialEq)]
pub struct PropensityToolConfig {
    pub executable: PathBuf,
    /// Extra environment for the tool process (e.g. its data directories).
    pub env: BTreeMap<String, String>,
    /// Restricts the calculation to a cavity around this point.
    pub cavity_origin: Option<Point3<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalculationConfig {
    pub probe_library_path: PathBuf,
    /// Probe size looked up in the library (default 7).
    pub probe_size: usize,
    /// Also sample positive and negative probes (default false).
    pub charged_probes: bool,
    pub propensity: PropensityToolConfig,
    /// Secondary buriedness tool; when set it replaces the per-job burial maps.
    pub buriedness_executable: Option<PathBuf>,
    /// Where job directories are created; a fresh directory under the system temp dir if
    /// unset.
    pub working_directory: Option<PathBuf>,
    /// Concurrent external jobs (default 5).
    pub workers: usize,
    pub job_timeout: Option<Duration>,
    pub sampler: SamplerConfig,
}

#[derive(Default)]
pub struct CalculationConfigBuilder {
    probe_library_path: Option<PathBuf>,
    probe_size: Option<usize>,
    charged_probes: Option<bool>,
    propensity_executable: Option<PathBuf>,
    propensity_env: BTreeMap<String, String>,
    cavity_origin: Option<Point3<f64>>,
    buriedness_executable: Option<PathBuf>,
    working_directory: Option<PathBuf>,
    workers: Option<usize>,
    job_timeout: Option<Duration>,
    sampler: Option<SamplerConfig>,
}

impl CalculationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe_library_path(mut self, path: PathBuf) -> Self {
        self.probe_library_path = Some(path);
        self
    }
    pub fn probe_size(mut self, size: usize) -> Self {
        self.probe_size = Some(size);
        self
    }
    pub fn charged_probes(mut self, enabled: bool) -> Self {
        self.charged_probes = Some(enabled);
        self
    }
    pub fn propensity_executable(mut self, path: PathBuf) -> Self {
        self.propensity_executable = Some(path);
        self
    }
    pub fn propensity_env(mut self, key: &str, value: &str) -> Self {
        self.propensity_env.insert(key.to_string(), value.to_string());
        self
    }
    pub fn cavity_origin(mut self, origin: Point3<f64>) -> Self {
        self.cavity_origin = Some(origin);
        self
    }
    pub fn buriedness_executable(mut self, path: PathBuf) -> Self {
        self.buriedness_executable = Some(path);
        self
    }
    pub fn working_directory(mut self, path: PathBuf) -> Self {
        self.working_directory = Some(path);
        self
    }
    pub fn workers(mut self, n: usize) -> Self {
        self.workers = Some(n);
        self
    }
    pub fn job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = Some(timeout);
        self
    }
    pub fn sampler(mut self, sampler: SamplerConfig) -> Self {
        self.sampler = Some(sampler);
        self
    }

    pub fn build(self) -> Result<CalculationConfig, ConfigError> {
        let config = CalculationConfig {
            probe_library_path: self
                .probe_library_path
                .ok_or(ConfigError::MissingParameter("probe_library_path"))?,
            probe_size: self.probe_size.unwrap_or(7),
            charged_probes: self.charged_probes.unwrap_or(false),
            propensity: PropensityToolConfig {
                executable: self
                    .propensity_executable
                    .ok_or(ConfigError::MissingParameter("propensity_executable"))?,
                env: self.propensity_env,
                cavity_origin: self.cavity_origin,
            },
            buriedness_executable: self.buriedness_executable,
            working_directory: self.working_directory,
            workers: self.workers.unwrap_or(5),
            job_timeout: self.job_timeout,
            sampler: self.sampler.unwrap_or_default(),
        };
        require_nonzero("probe_size", config.probe_size)?;
        require_nonzero("workers", config.workers)?;
        config.sampler.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sampler_builder_applies_documented_defaults() {
        let config = SamplerConfigBuilder::new().build().unwrap();
        assert_eq!(config, SamplerConfig::default());
        assert_eq!(config.rotations, 3000);
        assert_eq!(config.max_poses, 10_000);
        assert!(!config.polar_contributions);
    }

    #[test]
    fn sampler_builder_rejects_zero_rotations() {
        let err = SamplerConfigBuilder::new().rotations(0).build().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidParameter {
                name: "rotations",
                ..
            }
        ));
    }

    #[test]
    fn extraction_mode_parses_known_names_only() {
        assert_eq!("Volume".parse::<ExtractionMode>().unwrap(), ExtractionMode::Volume);
        assert_eq!("score".parse::<ExtractionMode>().unwrap(), ExtractionMode::Score);
        assert!(matches!(
            "peaks".parse::<ExtractionMode>(),
            Err(EngineError::InvalidExtractionMode(m)) if m == "peaks"
        ));
    }

    #[test]
    fn parent_threshold_depends_on_mode() {
        let volume = ExtractionConfig::default();
        assert_eq!(volume.parent_threshold(), 12.0);
        let score = ExtractionConfigBuilder::new()
            .mode(ExtractionMode::Score)
            .build()
            .unwrap();
        assert_eq!(score.parent_threshold(), 17.0);
    }

    #[test]
    fn selection_builder_validates_volume() {
        assert!(SelectionConfigBuilder::new().volume(-1.0).build().is_err());
        let config = SelectionConfigBuilder::new().volume(250.0).build().unwrap();
        assert_eq!(config.volume, 250.0);
        assert_eq!(config.xtol, 0.025);
    }

    #[test]
    fn calculation_builder_requires_paths() {
        let err = CalculationConfigBuilder::new().build().unwrap_err();
        assert_eq!(err, ConfigError::MissingParameter("probe_library_path"));

        let config = CalculationConfigBuilder::new()
            .probe_library_path(PathBuf::from("probes.toml"))
            .propensity_executable(PathBuf::from("superstar"))
            .propensity_env("SUPERSTAR_ROOT", "/opt/superstar")
            .build()
            .unwrap();
        assert_eq!(config.workers, 5);
        assert_eq!(config.probe_size, 7);
        assert_eq!(config.propensity.env.len(), 1);
    }
}
