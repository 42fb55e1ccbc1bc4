use crate::core::models::atom::Atom;
use crate::core::models::channel::{Channel, ParseChannelError};
use crate::core::models::molecule::{Molecule, Residue};
use nalgebra::Point3;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProbeLibraryFile {
    #[serde(rename = "probe", default)]
    probes: Vec<ProbeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ProbeEntry {
    name: Option<String>,
    channel: String,
    size: usize,
    atoms: Vec<ProbeAtomEntry>,
    #[serde(default)]
    bonds: Vec<[usize; 2]>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
struct ProbeAtomEntry {
    name: String,
    element: String,
    position: [f64; 3],
    #[serde(default)]
    donor: bool,
    #[serde(default)]
    acceptor: bool,
    #[serde(default)]
    aromatic: bool,
    #[serde(default)]
    formal_charge: i8,
}

#[derive(Debug, Error)]
pub enum ProbeLibraryError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
    #[error("Probe '{probe}' has an invalid channel: {source}")]
    Channel {
        probe: String,
        source: ParseChannelError,
    },
    #[error("Probe '{0}' has no atoms")]
    EmptyProbe(String),
    #[error("Probe '{probe}' bonds atoms {bond:?} that do not exist")]
    InvalidBond { probe: String, bond: [usize; 2] },
    #[error("Duplicate probe for channel '{channel}' and size {size}")]
    Duplicate { channel: Channel, size: usize },
}

/// Probe molecules keyed by channel and size.
#[derive(Debug, Clone, Default)]
pub struct ProbeLibrary {
    probes: BTreeMap<(Channel, usize), Molecule>,
}

impl ProbeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ProbeLibraryError> {
        let content = std::fs::read_to_string(path).map_err(|e| ProbeLibraryError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProbeLibraryError> {
        Self::parse(content, "<inline>")
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ProbeLibraryError> {
        let file: ProbeLibraryFile =
            toml::from_str(content).map_err(|e| ProbeLibraryError::Toml {
                path: origin.to_string(),
                source: e,
            })?;
        let mut library = Self::new();
        for entry in file.probes {
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| format!("{}-{}", entry.channel, entry.size));
            let channel: Channel =
                entry
                    .channel
                    .parse()
                    .map_err(|source| ProbeLibraryError::Channel {
                        probe: name.clone(),
                        source,
                    })?;
            let molecule = build_probe(&name, &entry)?;
            library.insert(channel, entry.size, molecule)?;
        }
        debug!(probes = library.len(), source = origin, "Loaded probe library.");
        Ok(library)
    }

    pub fn insert(
        &mut self,
        channel: Channel,
        size: usize,
        probe: Molecule,
    ) -> Result<(), ProbeLibraryError> {
        if self.probes.contains_key(&(channel, size)) {
            return Err(ProbeLibraryError::Duplicate { channel, size });
        }
        self.probes.insert((channel, size), probe);
        Ok(())
    }

    /// The probe for `channel` and `size`. Charged channels fall back to their smallest probe
    /// when the requested size is missing.
    pub fn get(&self, channel: Channel, size: usize) -> Option<&Molecule> {
        self.probes.get(&(channel, size)).or_else(|| {
            if channel.is_charged() {
                self.probes
                    .range((channel, 0)..=(channel, usize::MAX))
                    .next()
                    .map(|(_, m)| m)
            } else {
                None
            }
        })
    }

    pub fn len(&self) -> usize {
        self.probes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

fn build_probe(name: &str, entry: &ProbeEntry) -> Result<Molecule, ProbeLibraryError> {
    if entry.atoms.is_empty() {
        return Err(ProbeLibraryError::EmptyProbe(name.to_string()));
    }
    let mut molecule = Molecule::new(name);
    molecule.add_residue(Residue::new("PRB", 'P', 1, true));
    for (n, spec) in entry.atoms.iter().enumerate() {
        let [x, y, z] = spec.position;
        let mut atom = Atom::new(n + 1, &spec.name, &spec.element, Point3::new(x, y, z));
        atom.is_donor = spec.donor;
        atom.is_acceptor = spec.acceptor;
        atom.is_aromatic = spec.aromatic;
        atom.formal_charge = spec.formal_charge;
        molecule.add_atom(atom);
    }
    for bond in &entry.bonds {
        if bond[0] >= molecule.len() || bond[1] >= molecule.len() {
            return Err(ProbeLibraryError::InvalidBond {
                probe: name.to_string(),
                bond: *bond,
            });
        }
        molecule.add_bond(bond[0], bond[1]);
    }
    Ok(molecule)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"
[[probe]]
channel = "donor"
size = 2
bonds = [[0, 1]]

[[probe.atoms]]
name = "C1"
element = "C"
position = [0.0, 0.0, 0.0]

[[probe.atoms]]
name = "N1"
element = "N"
position = [1.4, 0.0, 0.0]
donor = true

[[probe]]
name = "ammonium"
channel = "positive"
size = 1

[[probe.atoms]]
name = "N1"
element = "N"
position = [0.0, 0.0, 0.0]
formal-charge = 1
"#;

    #[test]
    fn probes_are_keyed_by_channel_and_size() {
        let library = ProbeLibrary::from_toml_str(LIBRARY).unwrap();
        assert_eq!(library.len(), 2);
        let donor = library.get(Channel::Donor, 2).unwrap();
        assert_eq!(donor.name(), "donor-2");
        assert!(donor.atoms()[1].is_donor);
        assert_eq!(donor.bonds(), &[(0, 1)]);
        assert!(library.get(Channel::Donor, 7).is_none());
    }

    #[test]
    fn charged_channels_fall_back_to_any_size() {
        let library = ProbeLibrary::from_toml_str(LIBRARY).unwrap();
        let probe = library.get(Channel::Positive, 7).unwrap();
        assert_eq!(probe.name(), "ammonium");
        assert_eq!(probe.atoms()[0].formal_charge, 1);
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let text = LIBRARY.replace("\"donor\"", "\"hydrophobic\"");
        assert!(matches!(
            ProbeLibrary::from_toml_str(&text),
            Err(ProbeLibraryError::Channel { .. })
        ));
    }

    #[test]
    fn out_of_range_bond_is_rejected() {
        let text = LIBRARY.replace("[[0, 1]]", "[[0, 5]]");
        assert!(matches!(
            ProbeLibrary::from_toml_str(&text),
            Err(ProbeLibraryError::InvalidBond { .. })
        ));
    }
}
