use nalgebra::Point3;

/// An atom of a protein or probe molecule with the properties hotspot scoring relies on.
///
/// Interaction flags are assigned when a structure is read (see
/// [`crate::core::topology`]) or explicitly in a probe library; nothing downstream
/// re-derives them.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Serial number as found in the source file.
    pub serial: usize,
    /// The name of the atom (e.g., "CA", "OG1").
    pub name: String,
    /// Element symbol, capitalised (e.g., "C", "Cl").
    pub element: String,
    /// The 3D coordinates of the atom in Angstroms.
    pub position: Point3<f64>,
    /// Integer formal charge.
    pub formal_charge: i8,
    /// Whether the atom can donate a hydrogen bond.
    pub is_donor: bool,
    /// Whether the atom can accept a hydrogen bond.
    pub is_acceptor: bool,
    /// Whether the atom is part of an aromatic ring.
    pub is_aromatic: bool,
    /// Index of the parent residue within its molecule.
    pub residue_index: usize,
}

impl Atom {
    /// Creates a neutral, non-polar atom; flags can be set afterwards.
    pub fn new(serial: usize, name: &str, element: &str, position: Point3<f64>) -> Self {
        Self {
            serial,
            name: name.to_string(),
            element: normalize_element(element),
            position,
            formal_charge: 0,
            is_donor: false,
            is_acceptor: false,
            is_aromatic: false,
            residue_index: 0,
        }
    }

    pub fn is_hydrogen(&self) -> bool {
        self.element == "H" || self.element == "D"
    }

    pub fn is_carbon(&self) -> bool {
        self.element == "C"
    }

    /// Donor or acceptor.
    pub fn is_polar(&self) -> bool {
        self.is_donor || self.is_acceptor
    }
}

/// Brings an element symbol to canonical case ("CL" -> "Cl").
pub fn normalize_element(symbol: &str) -> String {
    let mut chars = symbol.trim().chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Guesses an element from a PDB-style atom name when the element columns are blank.
pub fn element_from_atom_name(name: &str) -> String {
    let letters: String = name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    match letters.get(..1) {
        Some(first) => normalize_element(first),
        None => String::new(),
    }
}
