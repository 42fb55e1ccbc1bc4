use super::config::ConfigError;
use crate::core::grid::GridError;
use crate::core::io::buriedness::BuriednessParseError;
use crate::core::io::grd::GrdError;
use crate::core::io::pdb::PdbError;
use crate::core::models::channel::Channel;
use crate::core::probes::library::ProbeLibraryError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Grid operation failed: {source}")]
    Grid {
        #[from]
        source: GridError,
    },

    #[error("Grid file error: {0}")]
    GridFile(#[from] GrdError),

    #[error("Structure file error: {0}")]
    Structure(#[from] PdbError),

    #[error("Buriedness output error: {0}")]
    Buriedness(#[from] BuriednessParseError),

    #[error("Probe library error: {0}")]
    ProbeLibrary(#[from] ProbeLibraryError),

    #[error("I/O error on '{path}': {source}", path = .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("External job '{job}' did not produce '{path}'", path = .path.display())]
    MissingExternalOutput { job: String, path: PathBuf },

    #[error("External job '{job}' failed: {reason}")]
    ExternalTool { job: String, reason: String },

    #[error("External job '{job}' exceeded its time limit of {seconds:.1}s")]
    Timeout { job: String, seconds: f64 },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("No island encloses the peak at ({:.2}, {:.2}, {:.2})", .peak[0], .peak[1], .peak[2])]
    NoParentRegion { peak: [f64; 3] },

    #[error("Feature '{feature}' has no hotspot within {distance} Å")]
    UnassignableFeature { feature: String, distance: f64 },

    #[error("No connected region could be selected for a volume of {volume} Å³")]
    EmptySelection { volume: f64 },

    #[error("Invalid extraction mode '{0}' (expected 'volume' or 'score')")]
    InvalidExtractionMode(String),

    #[error("Unsupported export format '{0}' (expected json, csv, py or cm)")]
    UnsupportedExportFormat(String),

    #[error("Result has no '{0}' map")]
    MissingChannel(Channel),

    #[error("No probe for channel '{channel}' and size {size}")]
    ProbeNotFound { channel: Channel, size: usize },

    #[error("Phase '{phase}' failed: {reason}")]
    PhaseFailed { phase: &'static str, reason: String },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
