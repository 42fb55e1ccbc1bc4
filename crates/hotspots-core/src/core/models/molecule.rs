use super::atom::Atom;
use nalgebra::{Point3, UnitQuaternion, Vector3};

#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    pub name: String,
    pub chain_id: char,
    pub number: isize,
    /// Read from HETATM records.
    pub hetero: bool,
}

impl Residue {
    pub fn new(name: &str, chain_id: char, number: isize, hetero: bool) -> Self {
        Self {
            name: name.to_string(),
            chain_id,
            number,
            hetero,
        }
    }
}

/// A protein or a probe: atoms grouped into residues plus covalent bonds by atom index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Molecule {
    name: String,
    atoms: Vec<Atom>,
    residues: Vec<Residue>,
    bonds: Vec<(usize, usize)>,
}

impl Molecule {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.atoms
    }

    pub fn atoms_mut(&mut self) -> &mut [Atom] {
        &mut self.atoms
    }

    pub fn atom(&self, index: usize) -> Option<&Atom> {
        self.atoms.get(index)
    }

    pub fn residues(&self) -> &[Residue] {
        &self.residues
    }

    pub fn residue_of(&self, atom: &Atom) -> Option<&Residue> {
        self.residues.get(atom.residue_index)
    }

    pub fn bonds(&self) -> &[(usize, usize)] {
        &self.bonds
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    pub fn add_residue(&mut self, residue: Residue) -> usize {
        self.residues.push(residue);
        self.residues.len() - 1
    }

    /// Appends an atom to the last residue, creating a placeholder residue if there is none.
    pub fn add_atom(&mut self, mut atom: Atom) -> usize {
        if self.residues.is_empty() {
            self.residues.push(Residue::new("UNK", 'A', 1, true));
        }
        atom.residue_index = self.residues.len() - 1;
        self.atoms.push(atom);
        self.atoms.len() - 1
    }

    /// Adds a bond between two atom indices; self-bonds, duplicates and unknown indices are
    /// ignored.
    pub fn add_bond(&mut self, a: usize, b: usize) -> bool {
        if a == b || a >= self.atoms.len() || b >= self.atoms.len() {
            return false;
        }
        let key = (a.min(b), a.max(b));
        if self.bonds.contains(&key) {
            return false;
        }
        self.bonds.push(key);
        true
    }

    pub fn neighbours(&self, index: usize) -> impl Iterator<Item = usize> + '_ {
        self.bonds.iter().filter_map(move |&(a, b)| {
            if a == index {
                Some(b)
            } else if b == index {
                Some(a)
            } else {
                None
            }
        })
    }

    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }

    /// Unweighted centroid of all atoms.
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum = self
            .atoms
            .iter()
            .fold(Vector3::zeros(), |acc, a| acc + a.position.coords);
        Some(Point3::from(sum / self.atoms.len() as f64))
    }

    pub fn carbon_count(&self) -> usize {
        self.atoms.iter().filter(|a| a.is_carbon()).count()
    }

    /// A copy without hydrogen atoms; bonds are re-indexed and bonds to hydrogens dropped.
    pub fn without_hydrogens(&self) -> Molecule {
        let mut remap = vec![None; self.atoms.len()];
        let mut out = Molecule {
            name: self.name.clone(),
            atoms: Vec::with_capacity(self.atoms.len()),
            residues: self.residues.clone(),
            bonds: Vec::new(),
        };
        for (old, atom) in self.atoms.iter().enumerate() {
            if !atom.is_hydrogen() {
                remap[old] = Some(out.atoms.len());
                out.atoms.push(atom.clone());
            }
        }
        for &(a, b) in &self.bonds {
            if let (Some(na), Some(nb)) = (remap[a], remap[b]) {
                out.bonds.push((na.min(nb), na.max(nb)));
            }
        }
        out
    }

    pub fn translate(&mut self, shift: &Vector3<f64>) {
        for atom in &mut self.atoms {
            atom.position += shift;
        }
    }

    /// Rigidly rotates every atom about `center`.
    pub fn rotate_about(&mut self, center: &Point3<f64>, rotation: &UnitQuaternion<f64>) {
        for atom in &mut self.atoms {
            atom.position = center + rotation * (atom.position - center);
        }
    }
}
