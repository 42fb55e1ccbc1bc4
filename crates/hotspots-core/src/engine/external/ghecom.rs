use super::process::run_logged;
use crate::core::grid::{GRID_SPACING, Grid};
use crate::core::io::buriedness::read_buriedness_path;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::MolecularFile;
use crate::core::models::molecule::Molecule;
use crate::engine::cancel::CancellationToken;
use crate::engine::error::EngineError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, instrument};

const PROTEIN_FILE: &str = "protein.pdb";
const POCKET_FILE: &str = "ghecom_out.pdb";
/// Cells of padding around the protein when no template frame is given.
const FRAME_PADDING: usize = 2;
const MIN_PROBE_RADIUS: f64 = 2.5;
const MAX_PROBE_RADIUS: f64 = 9.5;

/// The secondary buriedness tool: a multi-scale pocket scan over the protein.
#[derive(Debug, Clone)]
pub struct Ghecom {
    executable: PathBuf,
    timeout: Option<Duration>,
}

impl Ghecom {
    pub fn new(executable: PathBuf, timeout: Option<Duration>) -> Self {
        Self {
            executable,
            timeout,
        }
    }

    /// Runs the scan in `directory` and reads its pocket points onto `template`, or onto a
    /// frame enclosing the protein when no template is given.
    #[instrument(skip_all, name = "ghecom")]
    pub fn run(
        &self,
        protein: &Molecule,
        template: Option<&Grid>,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<Grid, EngineError> {
        cancel.check()?;
        fs::create_dir_all(directory).map_err(|e| EngineError::io(directory, e))?;
        PdbFile::write_to_path(protein, directory.join(PROTEIN_FILE))?;

        let mut command = Command::new(&self.executable);
        command
            .arg(PROTEIN_FILE)
            .args(["-M", "M", "-gw"])
            .arg(GRID_SPACING.to_string())
            .arg("-rli")
            .arg(MIN_PROBE_RADIUS.to_string())
            .arg("-rlx")
            .arg(MAX_PROBE_RADIUS.to_string())
            .args(["-opoc", POCKET_FILE]);
        run_logged(command, "ghecom", directory, self.timeout, cancel)?;

        let pocket = directory.join(POCKET_FILE);
        if !pocket.is_file() {
            return Err(EngineError::MissingExternalOutput {
                job: "ghecom".to_string(),
                path: pocket,
            });
        }
        let template = match template {
            Some(grid) => grid.clone(),
            None => Grid::enclosing(
                protein.atoms().iter().map(|a| &a.position),
                GRID_SPACING,
                FRAME_PADDING,
            )?,
        };
        let grid = read_buriedness_path(&pocket, &template)?;
        debug!(buried_cells = grid.count_above(0.0), "Buriedness map read.");
        Ok(grid)
    }
}
