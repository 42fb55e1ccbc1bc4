use crate::core::grid::Grid;
use nalgebra::Point3;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Largest probe radius of the pocket scan; burial is reported as `MAX_PROBE_RADIUS - rinacc`.
pub const MAX_PROBE_RADIUS: f64 = 9.5;

#[derive(Debug, Error)]
pub enum BuriednessParseError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid float in columns {columns} on line {line} (value: '{value}')")]
    InvalidFloat {
        line: usize,
        columns: &'static str,
        value: String,
    },
}

fn field(
    line: &str,
    line_num: usize,
    start: usize,
    end: usize,
    columns: &'static str,
) -> Result<f64, BuriednessParseError> {
    let raw = line.get(start..end.min(line.len())).unwrap_or("").trim();
    raw.parse().map_err(|_| BuriednessParseError::InvalidFloat {
        line: line_num,
        columns,
        value: raw.to_string(),
    })
}

/// Reads the pocket output of the secondary buriedness tool onto `template`'s frame.
///
/// Each `HETATM` record carries a pocket point and its inaccessibility radius; the nearest cell
/// receives `9.5 - radius`. Points outside the template are skipped.
pub fn read_buriedness(
    reader: &mut impl BufRead,
    template: &Grid,
) -> Result<Grid, BuriednessParseError> {
    let mut grid = template.copy_and_clear();
    let mut skipped = 0usize;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if !line.starts_with("HETATM") {
            continue;
        }
        let line_num = idx + 1;
        let x = field(&line, line_num, 31, 38, "32-38")?;
        let y = field(&line, line_num, 39, 46, "40-46")?;
        let z = field(&line, line_num, 47, 54, "48-54")?;
        let rinacc = field(&line, line_num, 61, 66, "62-66")?;
        match grid.indices_of(&Point3::new(x, y, z)) {
            Some(cell) => {
                grid.set_value(cell, MAX_PROBE_RADIUS - rinacc);
            }
            None => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(skipped, "Pocket points outside the buriedness frame were ignored.");
    }
    Ok(grid)
}

pub fn read_buriedness_path(
    path: &Path,
    template: &Grid,
) -> Result<Grid, BuriednessParseError> {
    let mut reader = BufReader::new(File::open(path)?);
    read_buriedness(&mut reader, template)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::grid::GRID_SPACING;
    use std::io::Cursor;

    fn pocket_line(x: f64, y: f64, z: f64, rinacc: f64) -> String {
        format!(
            "HETATM    1  C   GRD     1    {:7.3} {:7.3} {:7.3}       {:5.2}  1.00",
            x, y, z, rinacc
        )
    }

    #[test]
    fn pocket_points_become_burial_values() {
        let template = Grid::new(Point3::origin(), GRID_SPACING, [6, 6, 6]).unwrap();
        let text = [
            "REMARK pocket".to_string(),
            pocket_line(1.0, 1.5, 2.0, 3.5),
            pocket_line(50.0, 0.0, 0.0, 2.5),
        ]
        .join("\n");
        let grid = read_buriedness(&mut Cursor::new(text), &template).unwrap();
        assert_eq!(grid.value([2, 3, 4]), Some(6.0));
        assert_eq!(grid.count_above(0.0), 1);
    }

    #[test]
    fn malformed_radius_is_reported() {
        let template = Grid::new(Point3::origin(), GRID_SPACING, [2, 2, 2]).unwrap();
        let mut line = pocket_line(0.0, 0.0, 0.0, 1.0);
        line.replace_range(61..66, "  abc");
        assert!(matches!(
            read_buriedness(&mut Cursor::new(line), &template),
            Err(BuriednessParseError::InvalidFloat { line: 1, columns: "62-66", .. })
        ));
    }
}
