use super::PropensityTool;
use super::process::run_logged;
use crate::core::grid::Grid;
use crate::core::io::grd::GrdFile;
use crate::core::io::pdb::PdbFile;
use crate::core::io::traits::{GridFile, MolecularFile};
use crate::core::models::channel::Channel;
use crate::core::models::molecule::Molecule;
use crate::engine::cancel::CancellationToken;
use crate::engine::config::PropensityToolConfig;
use crate::engine::error::EngineError;
use crate::engine::weighting::PropensityMaps;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

const PROTEIN_FILE: &str = "protein.pdb";
const MAP_BACKGROUND_VALUE: u32 = 1;
const BOX_BORDER: u32 = 10;
const MIN_PROPENSITY: u32 = 1;

/// The knowledge-based propensity tool, run once per channel in its own directory.
///
/// Each run writes `protein.pdb` and `<channel>.ins`, executes the tool on the instruction
/// file, then reads back `<channel>.ins.acnt` (propensity) and `<channel>.ins.ligsite.acnt`
/// (burial).
#[derive(Debug, Clone)]
pub struct Superstar {
    config: PropensityToolConfig,
    timeout: Option<Duration>,
}

impl Superstar {
    pub fn new(config: PropensityToolConfig, timeout: Option<Duration>) -> Self {
        Self { config, timeout }
    }

    /// The instruction file contents for `channel`.
    pub fn instructions(&self, channel: Channel) -> String {
        let mut ins = String::new();
        let _ = writeln!(ins, "JOBNAME {}.ins", channel.name());
        let _ = writeln!(ins, "PROBENAME {}", channel.propensity_probe());
        let _ = writeln!(ins, "MOLECULE_FILE {PROTEIN_FILE}");
        let _ = writeln!(ins, "MAP_FORMAT SYBYL_ASCII_CONTOUR");
        let _ = writeln!(ins, "MAP_BACKGROUND_VALUE {MAP_BACKGROUND_VALUE}");
        let _ = writeln!(ins, "BOX_BORDER {BOX_BORDER}");
        let _ = writeln!(ins, "MIN_PROPENSITY {MIN_PROPENSITY}");
        let _ = writeln!(ins, "SAVE_CAVITY NO");
        match self.config.cavity_origin {
            Some(p) => {
                let _ = write!(ins, "CAVITY_ORIGIN {} {} {}", p.x, p.y, p.z);
            }
            None => ins.push_str("SUBSTRUCTURE ALL"),
        }
        ins.push('\n');
        ins
    }
}

impl PropensityTool for Superstar {
    fn name(&self) -> &str {
        "superstar"
    }

    fn run(
        &self,
        channel: Channel,
        protein: &Molecule,
        directory: &Path,
        cancel: &CancellationToken,
    ) -> Result<PropensityMaps, EngineError> {
        cancel.check()?;
        fs::create_dir_all(directory).map_err(|e| EngineError::io(directory, e))?;
        PdbFile::write_to_path(protein, directory.join(PROTEIN_FILE))?;

        let ins_name = format!("{}.ins", channel.name());
        let ins_path = directory.join(&ins_name);
        fs::write(&ins_path, self.instructions(channel))
            .map_err(|e| EngineError::io(&ins_path, e))?;

        let mut command = Command::new(&self.config.executable);
        command.arg(&ins_name).envs(&self.config.env);
        debug!(channel = %channel, directory = %directory.display(), "Running propensity job.");
        run_logged(command, channel.name(), directory, self.timeout, cancel)?;

        let job = format!("{}:{}", self.name(), channel.name());
        let propensity = read_output(&job, &directory.join(format!("{ins_name}.acnt")))?;
        let ligsite = read_output(&job, &directory.join(format!("{ins_name}.ligsite.acnt")))?;
        Ok(PropensityMaps {
            propensity,
            ligsite,
        })
    }
}

/// Reads a grid the tool was expected to write.
pub(crate) fn read_output(job: &str, path: &Path) -> Result<Grid, EngineError> {
    if !path.is_file() {
        return Err(EngineError::MissingExternalOutput {
            job: job.to_string(),
            path: PathBuf::from(path),
        });
    }
    Ok(GrdFile::read_from_path(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use crate::core::models::atom::Atom;
    use crate::core::models::molecule::Residue;
    use nalgebra::Point3;
    use std::collections::BTreeMap;

    fn protein() -> Molecule {
        let mut m = Molecule::new("protein");
        m.add_residue(Residue::new("ALA", 'A', 1, false));
        m.add_atom(Atom::new(1, "CA", "C", Point3::new(1.0, 2.0, 3.0)));
        m
    }

    fn tool(executable: PathBuf, env: BTreeMap<String, String>) -> Superstar {
        Superstar::new(
            PropensityToolConfig {
                executable,
                env,
                cavity_origin: None,
            },
            Some(Duration::from_secs(30)),
        )
    }

    #[test]
    fn instructions_name_the_probe_and_the_search_region() {
        let mut superstar = tool(PathBuf::from("superstar"), BTreeMap::new());
        let ins = superstar.instructions(Channel::Donor);
        assert!(ins.starts_with("JOBNAME donor.ins\n"));
        assert!(ins.contains("PROBENAME UNCHARGED NH NITROGEN\n"));
        assert!(ins.ends_with("SUBSTRUCTURE ALL\n"));

        superstar.config.cavity_origin = Some(Point3::new(1.5, -2.0, 3.25));
        let ins = superstar.instructions(Channel::Apolar);
        assert!(ins.contains("PROBENAME AROMATIC CH CARBON\n"));
        assert!(ins.ends_with("CAVITY_ORIGIN 1.5 -2 3.25\n"));
        assert!(!ins.contains("SUBSTRUCTURE"));
    }

    #[test]
    fn missing_tool_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_output("superstar:donor", &dir.path().join("donor.ins.acnt"));
        assert!(matches!(
            err,
            Err(EngineError::MissingExternalOutput { job, .. }) if job == "superstar:donor"
        ));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-superstar.sh");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn a_successful_run_yields_both_maps() {
        let scratch = tempfile::tempdir().unwrap();
        let mut map = Grid::new(Point3::origin(), GRID_SPACING, [3, 3, 3]).unwrap();
        map.set_value([1, 1, 1], 4.0);
        let source = scratch.path().join("map.acnt");
        GrdFile::write_to_path(&map, "fake", &source).unwrap();

        let script = write_script(
            scratch.path(),
            "test -f protein.pdb || exit 2\ncp \"$FAKE_MAP\" \"$1.acnt\"\ncp \"$FAKE_MAP\" \"$1.ligsite.acnt\"",
        );
        let env = BTreeMap::from([(
            "FAKE_MAP".to_string(),
            source.to_string_lossy().to_string(),
        )]);
        let job_dir = scratch.path().join("acceptor");
        let maps = tool(script, env)
            .run(Channel::Acceptor, &protein(), &job_dir, &CancellationToken::new())
            .unwrap();
        assert_eq!(maps.propensity.value([1, 1, 1]), Some(4.0));
        assert_eq!(maps.ligsite.shape(), [3, 3, 3]);
        assert!(job_dir.join("acceptor.ins").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn a_silent_run_is_missing_its_output() {
        let scratch = tempfile::tempdir().unwrap();
        let script = write_script(scratch.path(), "exit 0");
        let err = tool(script, BTreeMap::new()).run(
            Channel::Apolar,
            &protein(),
            &scratch.path().join("apolar"),
            &CancellationToken::new(),
        );
        assert!(matches!(err, Err(EngineError::MissingExternalOutput { .. })));
    }
}
