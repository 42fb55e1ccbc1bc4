use crate::core::io::traits::MolecularFile;
use crate::core::models::atom::{Atom, element_from_atom_name};
use crate::core::models::molecule::{Molecule, Residue};
use crate::core::topology::typing::assign_interaction_types;
use nalgebra::Point3;
use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdbError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse { line: usize, kind: PdbParseErrorKind },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("Missing required record: {0}")]
    MissingRecord(String),
}

#[derive(Debug, Error)]
pub enum PdbParseErrorKind {
    #[error("Invalid integer format in columns {columns} (value: '{value}')")]
    InvalidInt { columns: String, value: String },
    #[error("Invalid float format in columns {columns} (value: '{value}')")]
    InvalidFloat { columns: String, value: String },
    #[error("Invalid formal charge '{0}' in columns 79-80")]
    InvalidCharge(String),
    #[error("Line is too short for ATOM/HETATM record (must be at least 54 chars)")]
    LineTooShort,
}

fn slice_and_trim(line: &str, start: usize, end: usize) -> &str {
    line.get(start..end.min(line.len())).unwrap_or("").trim()
}

fn parse_float(line: &str, line_num: usize, start: usize, end: usize) -> Result<f64, PdbError> {
    let value = slice_and_trim(line, start, end);
    value.parse().map_err(|_| PdbError::Parse {
        line: line_num,
        kind: PdbParseErrorKind::InvalidFloat {
            columns: format!("{}-{}", start + 1, end),
            value: value.into(),
        },
    })
}

/// Parses PDB formal charges such as `1+`, `2-` or `-1`.
fn parse_charge(field: &str) -> Option<i8> {
    if field.is_empty() {
        return Some(0);
    }
    let (digits, negative) = match (field.strip_suffix('+'), field.strip_suffix('-')) {
        (Some(d), _) => (d, false),
        (_, Some(d)) => (d, true),
        _ => return field.parse().ok(),
    };
    let magnitude: i8 = if digits.is_empty() { 1 } else { digits.parse().ok()? };
    Some(if negative { -magnitude } else { magnitude })
}

fn format_charge(charge: i8) -> String {
    match charge {
        0 => String::new(),
        c if c > 0 => format!("{c}+"),
        c => format!("{}-", -c),
    }
}

/// Protein Data Bank structures (ATOM, HETATM and CONECT records of the first model).
///
/// Interaction types are assigned to every atom after reading.
pub struct PdbFile;

impl MolecularFile for PdbFile {
    type Error = PdbError;

    fn read_from(reader: &mut impl BufRead) -> Result<Molecule, Self::Error> {
        let mut molecule = Molecule::new("protein");
        let mut serial_to_index: HashMap<usize, usize> = HashMap::new();
        let mut conect: Vec<(usize, usize)> = Vec::new();
        let mut current_residue: Option<(char, isize, String)> = None;

        for (line_num, line_res) in reader.lines().enumerate() {
            let line = line_res?;
            let line_num = line_num + 1;
            let record_type = slice_and_trim(&line, 0, 6);

            match record_type {
                "HEADER" => {
                    let name = slice_and_trim(&line, 62, 66);
                    if !name.is_empty() {
                        molecule.set_name(name);
                    }
                }
                "ATOM" | "HETATM" => {
                    if line.len() < 54 {
                        return Err(PdbError::Parse {
                            line: line_num,
                            kind: PdbParseErrorKind::LineTooShort,
                        });
                    }
                    let serial_str = slice_and_trim(&line, 6, 11);
                    let serial: usize = serial_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "7-11".into(),
                            value: serial_str.into(),
                        },
                    })?;
                    let name = slice_and_trim(&line, 12, 16);
                    let res_name = slice_and_trim(&line, 17, 20);
                    let chain_id = line.get(21..22).and_then(|s| s.chars().next()).unwrap_or(' ');
                    let res_seq_str = slice_and_trim(&line, 22, 26);
                    let res_seq: isize = res_seq_str.parse().map_err(|_| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidInt {
                            columns: "23-26".into(),
                            value: res_seq_str.into(),
                        },
                    })?;
                    let x = parse_float(&line, line_num, 30, 38)?;
                    let y = parse_float(&line, line_num, 38, 46)?;
                    let z = parse_float(&line, line_num, 46, 54)?;
                    let element = match slice_and_trim(&line, 76, 78) {
                        "" => element_from_atom_name(name),
                        e => e.to_string(),
                    };
                    let charge_str = slice_and_trim(&line, 78, 80);
                    let formal_charge = parse_charge(charge_str).ok_or_else(|| PdbError::Parse {
                        line: line_num,
                        kind: PdbParseErrorKind::InvalidCharge(charge_str.into()),
                    })?;

                    let key = (chain_id, res_seq, res_name.to_string());
                    if current_residue.as_ref() != Some(&key) {
                        molecule.add_residue(Residue::new(
                            res_name,
                            chain_id,
                            res_seq,
                            record_type == "HETATM",
                        ));
                        current_residue = Some(key);
                    }

                    let mut atom = Atom::new(serial, name, &element, Point3::new(x, y, z));
                    atom.formal_charge = formal_charge;
                    let index = molecule.add_atom(atom);
                    if serial_to_index.insert(serial, index).is_some() {
                        return Err(PdbError::Inconsistency(format!(
                            "Duplicate atom serial: {serial}"
                        )));
                    }
                }
                "CONECT" => {
                    let mut serials = line
                        .split_whitespace()
                        .skip(1)
                        .filter_map(|s| s.parse::<usize>().ok());
                    if let Some(origin) = serials.next() {
                        conect.extend(serials.map(|partner| (origin, partner)));
                    }
                }
                "ENDMDL" | "END" => break,
                _ => {}
            }
        }

        if molecule.is_empty() {
            return Err(PdbError::MissingRecord("ATOM/HETATM records".into()));
        }
        for (a, b) in conect {
            if let (Some(&ia), Some(&ib)) = (serial_to_index.get(&a), serial_to_index.get(&b)) {
                molecule.add_bond(ia, ib);
            }
        }
        assign_interaction_types(&mut molecule);
        Ok(molecule)
    }

    fn write_to(molecule: &Molecule, writer: &mut impl Write) -> Result<(), Self::Error> {
        for atom in molecule.atoms() {
            let residue = molecule.residue_of(atom).ok_or_else(|| {
                PdbError::Inconsistency(format!(
                    "Atom {} refers to missing residue {}",
                    atom.serial, atom.residue_index
                ))
            })?;
            let record = if residue.hetero { "HETATM" } else { "ATOM" };
            let name = if atom.name.len() < 4 && atom.element.len() == 1 {
                format!(" {:<3}", atom.name)
            } else {
                format!("{:<4}", atom.name)
            };
            writeln!(
                writer,
                "{:<6}{:>5} {} {:>3} {}{:>4}    {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}{:<2}",
                record,
                atom.serial,
                name,
                residue.name,
                residue.chain_id,
                residue.number,
                atom.position.x,
                atom.position.y,
                atom.position.z,
                1.0,
                0.0,
                atom.element.to_ascii_uppercase(),
                format_charge(atom.formal_charge)
            )?;
        }

        let mut partners: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &(a, b) in molecule.bonds() {
            let (sa, sb) = (molecule.atoms()[a].serial, molecule.atoms()[b].serial);
            partners.entry(sa).or_default().push(sb);
            partners.entry(sb).or_default().push(sa);
        }
        for (serial, others) in &partners {
            for chunk in others.chunks(4) {
                write!(writer, "CONECT{serial:>5}")?;
                for other in chunk {
                    write!(writer, "{other:>5}")?;
                }
                writeln!(writer)?;
            }
        }
        writeln!(writer, "END")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SERINE: &str = "\
HEADER    HYDROLASE                               01-JAN-00   1ABC
ATOM      1  N   SER A   5      11.104   6.134  -6.504  1.00  0.00           N
ATOM      2  CA  SER A   5      11.639   6.071  -5.147  1.00  0.00           C
ATOM      3  OG  SER A   5      12.500   7.100  -4.800  1.00  0.00           O
ATOM      4  NZ  LYS A   6      14.000   7.100  -4.800  1.00  0.00           N1+
HETATM    5  O   HOH W 101      20.000  20.000  20.000  1.00  0.00           O
CONECT    1    2
CONECT    2    3
END
";

    #[test]
    fn reads_atoms_residues_and_typing() {
        let m = PdbFile::read_from(&mut Cursor::new(SERINE)).unwrap();
        assert_eq!(m.name(), "1ABC");
        assert_eq!(m.len(), 5);
        assert_eq!(m.residues().len(), 3);
        assert!(m.residues()[2].hetero);
        assert_eq!(m.bonds(), &[(0, 1), (1, 2)]);

        let atoms = m.atoms();
        assert!(atoms[0].is_donor);
        assert!(atoms[2].is_donor && atoms[2].is_acceptor);
        assert_eq!(atoms[3].formal_charge, 1);
        assert_eq!(atoms[1].position, Point3::new(11.639, 6.071, -5.147));
    }

    #[test]
    fn written_structure_reads_back() {
        let m = PdbFile::read_from(&mut Cursor::new(SERINE)).unwrap();
        let mut out = Vec::new();
        PdbFile::write_to(&m, &mut out).unwrap();
        let again = PdbFile::read_from(&mut Cursor::new(out)).unwrap();
        assert_eq!(again.len(), m.len());
        assert_eq!(again.bonds(), m.bonds());
        assert_eq!(again.atoms()[3].formal_charge, 1);
        assert_eq!(again.atoms()[4].position, m.atoms()[4].position);
    }

    #[test]
    fn charge_fields_parse_both_conventions() {
        assert_eq!(parse_charge(""), Some(0));
        assert_eq!(parse_charge("2-"), Some(-2));
        assert_eq!(parse_charge("1+"), Some(1));
        assert_eq!(parse_charge("-1"), Some(-1));
        assert_eq!(parse_charge("x"), None);
    }

    #[test]
    fn short_atom_line_is_rejected() {
        let text = "ATOM      1  N   SER A   5      11.104\n";
        assert!(matches!(
            PdbFile::read_from(&mut Cursor::new(text)),
            Err(PdbError::Parse { line: 1, kind: PdbParseErrorKind::LineTooShort })
        ));
    }

    #[test]
    fn empty_input_is_missing_atoms() {
        assert!(matches!(
            PdbFile::read_from(&mut Cursor::new("END\n")),
            Err(PdbError::MissingRecord(_))
        ));
    }
}
