use crate::core::grid::{GRID_SPACING, Grid, GridError};
use crate::core::io::traits::GridFile;
use nalgebra::Point3;
use ndarray::Array3;
use std::io::{self, BufRead, Write};
use thiserror::Error;

const FORMAT_LINE: &str = "(1p,e12.5)";
const CELL_ANGLE: f64 = 90.0;

#[derive(Debug, Error)]
pub enum GrdError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: GrdParseErrorKind },
    #[error("Grid file ended before its header was complete")]
    TruncatedHeader,
    #[error("Expected {expected} grid values, found {found}")]
    TruncatedValues { expected: usize, found: usize },
    #[error("Invalid grid geometry: {0}")]
    Geometry(#[from] GridError),
}

#[derive(Debug, Error)]
pub enum GrdParseErrorKind {
    #[error("Expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("Invalid integer '{0}'")]
    InvalidInt(String),
    #[error("Invalid float '{0}'")]
    InvalidFloat(String),
    #[error("Extent {start}..{end} is empty")]
    EmptyExtent { start: i64, end: i64 },
}

/// InsightII-style ASCII grid files (`.grd`, `.acnt`).
///
/// The header records the box lengths, the number of intervals per axis and the index extents
/// of the lattice (origin divided by spacing). Values follow one per line with x varying
/// fastest.
pub struct GrdFile;

fn parse_fields<T: std::str::FromStr>(
    line: &str,
    line_num: usize,
    expected: usize,
    invalid: fn(String) -> GrdParseErrorKind,
) -> Result<Vec<T>, GrdError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < expected {
        return Err(GrdError::Parse {
            line: line_num,
            kind: GrdParseErrorKind::FieldCount {
                expected,
                found: fields.len(),
            },
        });
    }
    fields
        .iter()
        .take(expected)
        .map(|f| {
            f.parse::<T>().map_err(|_| GrdError::Parse {
                line: line_num,
                kind: invalid((*f).to_string()),
            })
        })
        .collect()
}

/// Fortran `1p,e12.5` rendering, e.g. `1.23450E+01`.
fn format_scientific(value: f64) -> String {
    let rendered = format!("{value:.5E}");
    match rendered.split_once('E') {
        Some((mantissa, exponent)) => match exponent.parse::<i32>() {
            Ok(exp) => format!(
                "{mantissa}E{}{:02}",
                if exp < 0 { '-' } else { '+' },
                exp.abs()
            ),
            Err(_) => rendered,
        },
        None => rendered,
    }
}

impl GridFile for GrdFile {
    type Error = GrdError;

    fn read_from(reader: &mut impl BufRead) -> Result<Grid, Self::Error> {
        let mut lines = reader.lines().enumerate();
        let mut header = Vec::with_capacity(5);
        while header.len() < 5 {
            let (idx, line) = lines.next().ok_or(GrdError::TruncatedHeader)?;
            header.push((idx + 1, line?));
        }

        let (box_line, box_text) = &header[2];
        let box_lengths: Vec<f64> =
            parse_fields(box_text, *box_line, 3, GrdParseErrorKind::InvalidFloat)?;
        let (num, extent_text) = &header[4];
        let num = *num;
        let extents: Vec<i64> = parse_fields(extent_text, num, 7, GrdParseErrorKind::InvalidInt)?;

        let mut shape = [0usize; 3];
        let mut starts = [0i64; 3];
        for axis in 0..3 {
            let (start, end) = (extents[1 + 2 * axis], extents[2 + 2 * axis]);
            if end < start {
                return Err(GrdError::Parse {
                    line: num,
                    kind: GrdParseErrorKind::EmptyExtent { start, end },
                });
            }
            starts[axis] = start;
            shape[axis] = (end - start + 1) as usize;
        }
        let spacing = (0..3)
            .find(|&axis| shape[axis] > 1 && box_lengths[axis] > 0.0)
            .map(|axis| box_lengths[axis] / (shape[axis] - 1) as f64)
            .unwrap_or(GRID_SPACING);

        let expected = shape[0] * shape[1] * shape[2];
        let mut flat = Vec::with_capacity(expected);
        for (idx, line) in lines {
            let line = line?;
            for token in line.split_whitespace() {
                if flat.len() == expected {
                    break;
                }
                let value: f64 = token.parse().map_err(|_| GrdError::Parse {
                    line: idx + 1,
                    kind: GrdParseErrorKind::InvalidFloat(token.to_string()),
                })?;
                flat.push(value);
            }
            if flat.len() == expected {
                break;
            }
        }
        if flat.len() < expected {
            return Err(GrdError::TruncatedValues {
                expected,
                found: flat.len(),
            });
        }

        let [nx, ny, _] = shape;
        let values = Array3::from_shape_fn((shape[0], shape[1], shape[2]), |(i, j, k)| {
            flat[i + nx * (j + ny * k)]
        });
        let origin = Point3::new(
            starts[0] as f64 * spacing,
            starts[1] as f64 * spacing,
            starts[2] as f64 * spacing,
        );
        Ok(Grid::from_values(origin, spacing, values)?)
    }

    fn write_to(grid: &Grid, title: &str, writer: &mut impl Write) -> Result<(), Self::Error> {
        let [nx, ny, nz] = grid.shape();
        let spacing = grid.spacing();
        let offset = grid.lattice_offset();

        writeln!(writer, "{title}")?;
        writeln!(writer, "{FORMAT_LINE}")?;
        writeln!(
            writer,
            "{:10.3}{:10.3}{:10.3}{:10.3}{:10.3}{:10.3}",
            (nx - 1) as f64 * spacing,
            (ny - 1) as f64 * spacing,
            (nz - 1) as f64 * spacing,
            CELL_ANGLE,
            CELL_ANGLE,
            CELL_ANGLE
        )?;
        writeln!(writer, "{:5}{:5}{:5}", nx - 1, ny - 1, nz - 1)?;
        writeln!(
            writer,
            "{:5}{:5}{:5}{:5}{:5}{:5}{:5}",
            1,
            offset[0],
            offset[0] + nx as i64 - 1,
            offset[1],
            offset[1] + ny as i64 - 1,
            offset[2],
            offset[2] + nz as i64 - 1
        )?;
        let values = grid.values();
        for k in 0..nz {
            for j in 0..ny {
                for i in 0..nx {
                    writeln!(writer, "{:>12}", format_scientific(values[[i, j, k]]))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufReader, Cursor};

    fn sample_grid() -> Grid {
        let mut g = Grid::new(Point3::new(-1.5, 2.0, 0.5), GRID_SPACING, [3, 2, 4]).unwrap();
        for (n, v) in g.values_mut().iter_mut().enumerate() {
            *v = n as f64 * 1.25 - 3.0;
        }
        g
    }

    #[test]
    fn scientific_values_use_signed_two_digit_exponents() {
        assert_eq!(format_scientific(12.345), "1.23450E+01");
        assert_eq!(format_scientific(-0.001), "-1.00000E-03");
        assert_eq!(format_scientific(0.0), "0.00000E+00");
    }

    #[test]
    fn header_encodes_lattice_extents() {
        let mut out = Vec::new();
        GrdFile::write_to(&sample_grid(), "test grid", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "test grid");
        assert_eq!(lines[1], "(1p,e12.5)");
        assert_eq!(lines[3].split_whitespace().collect::<Vec<_>>(), ["2", "1", "3"]);
        assert_eq!(
            lines[4].split_whitespace().collect::<Vec<_>>(),
            ["1", "-3", "-1", "4", "5", "1", "4"]
        );
        assert_eq!(lines.len(), 5 + 24);
    }

    #[test]
    fn written_grid_reads_back_on_the_same_frame() {
        let original = sample_grid();
        let mut out = Vec::new();
        GrdFile::write_to(&original, "t", &mut out).unwrap();
        let parsed = GrdFile::read_from(&mut BufReader::new(Cursor::new(out))).unwrap();
        assert!(parsed.same_frame(&original));
        assert_eq!(parsed.origin(), original.origin());
        for (a, b) in parsed.values().iter().zip(original.values()) {
            assert!((a - b).abs() <= 1e-5 * b.abs().max(1.0));
        }
    }

    #[test]
    fn values_may_share_lines() {
        let text = "t\n(1p,e12.5)\n 0.5 0.0 0.0 90 90 90\n 1 0 0\n 1 0 1 0 0 0 0\n 1.0 2.0\n";
        let g = GrdFile::read_from(&mut Cursor::new(text)).unwrap();
        assert_eq!(g.shape(), [2, 1, 1]);
        assert_eq!(g.value([1, 0, 0]), Some(2.0));
    }

    #[test]
    fn truncated_value_section_is_an_error() {
        let text = "t\n(1p,e12.5)\n 0.5 0.0 0.0 90 90 90\n 1 0 0\n 1 0 1 0 0 0 0\n 1.0\n";
        assert!(matches!(
            GrdFile::read_from(&mut Cursor::new(text)),
            Err(GrdError::TruncatedValues {
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn malformed_extents_report_line_number() {
        let text = "t\n(1p,e12.5)\n 0.5 0.0 0.0 90 90 90\n 1 0 0\n 1 0 x 0 0 0 0\n";
        assert!(matches!(
            GrdFile::read_from(&mut Cursor::new(text)),
            Err(GrdError::Parse { line: 5, .. })
        ));
    }
}
