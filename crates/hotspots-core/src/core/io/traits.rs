use crate::core::grid::Grid;
use crate::core::models::molecule::Molecule;
use std::error::Error;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Defines the interface for reading and writing molecular structure formats.
///
/// Implementors handle format-specific parsing and serialization; the path-based helpers
/// wrap them in buffered file handles.
pub trait MolecularFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a molecule from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if parsing fails or I/O operations encounter issues.
    fn read_from(reader: &mut impl BufRead) -> Result<Molecule, Self::Error>;

    /// Writes a molecule to a writer.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_to(molecule: &Molecule, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Molecule, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(molecule: &Molecule, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(molecule, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

/// Defines the interface for reading and writing volumetric grid formats.
pub trait GridFile {
    /// The error type for I/O operations.
    type Error: Error + From<io::Error>;

    /// Reads a grid from a buffered reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is malformed or the value section is incomplete.
    fn read_from(reader: &mut impl BufRead) -> Result<Grid, Self::Error>;

    /// Writes a grid to a writer under the given title line.
    fn write_to(grid: &Grid, title: &str, writer: &mut impl Write) -> Result<(), Self::Error>;

    fn read_from_path<P: AsRef<Path>>(path: P) -> Result<Grid, Self::Error> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_from(&mut reader)
    }

    fn write_to_path<P: AsRef<Path>>(grid: &Grid, title: &str, path: P) -> Result<(), Self::Error> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_to(grid, title, &mut writer)?;
        writer.flush()?;
        Ok(())
    }
}
