use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Fragment hotspot maps: where a protein pocket favours apolar, donor, acceptor and charged fragments.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output and progress display
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Number of threads for probe sampling.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calculate hotspot maps for a protein structure.
    Calculate(CalculateArgs),
    /// Split a hotspot result into fragment-sized hotspots with their pharmacophores.
    Extract(ExtractArgs),
    /// Select the best continuous region of a given volume from a hotspot result.
    Select(SelectArgs),
}

/// Arguments for the `calculate` subcommand.
#[derive(Args, Debug)]
pub struct CalculateArgs {
    /// Protein structure in PDB format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory the result is written to.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the probe library.
    #[arg(short = 'p', long, value_name = "PATH")]
    pub probes: Option<PathBuf>,

    /// Override the propensity tool executable.
    #[arg(long, value_name = "PATH")]
    pub superstar: Option<PathBuf>,

    /// Weight with the secondary buriedness tool at this path.
    #[arg(long, value_name = "PATH")]
    pub ghecom: Option<PathBuf>,

    /// Also sample positive and negative probes.
    #[arg(long)]
    pub charged: bool,

    /// Restrict the propensity calculation to a cavity around this point.
    #[arg(long, value_name = "X,Y,Z", value_delimiter = ',')]
    pub cavity_origin: Option<Vec<f64>>,

    /// Override the number of random probe orientations.
    #[arg(short, long, value_name = "INT")]
    pub rotations: Option<usize>,

    /// Seed the orientation generator for reproducible maps.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Override the number of concurrent propensity jobs.
    #[arg(short, long, value_name = "INT")]
    pub workers: Option<usize>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.rotations=1000
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Directory holding a saved hotspot result.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory the hotspots are written to, one sub-directory each.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the extraction mode ('volume' or 'score').
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Override the peak and feature cutoff.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Override the target volume of each hotspot, in cubic Ångström.
    #[arg(long, value_name = "FLOAT")]
    pub volume: Option<f64>,

    /// Pharmacophore file format (json, csv, py or cm).
    #[arg(long, value_name = "EXT", default_value = "json")]
    pub pharmacophore_format: String,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `select` subcommand.
#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Directory holding a saved hotspot result.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub input: PathBuf,

    /// Directory receiving the `bcv` and `remaining` results.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the target volume, in cubic Ångström.
    #[arg(long, value_name = "FLOAT")]
    pub volume: Option<f64>,

    /// Grid file whose cells at or above 1 are excluded from selection.
    #[arg(short = 'x', long, value_name = "PATH")]
    pub exclude: Option<PathBuf>,

    /// Set a specific configuration value, overriding the config file.
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
