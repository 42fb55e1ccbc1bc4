use super::rules::{BACKBONE_NITROGEN, BACKBONE_OXYGEN, RESIDUE_ATOM_TYPES, STANDARD_RESIDUES};
use super::rules::AtomTyping;
use crate::core::models::molecule::Molecule;
use tracing::trace;

/// Typing of an atom in a standard residue, or `None` if the residue is not a standard
/// amino acid or water.
pub fn residue_atom_typing(residue_name: &str, atom_name: &str) -> Option<AtomTyping> {
    let residue = residue_name.trim().to_ascii_uppercase();
    let atom = atom_name.trim().to_ascii_uppercase();
    let key = format!("{residue}:{atom}");
    if let Some(t) = RESIDUE_ATOM_TYPES.get(key.as_str()) {
        return Some(*t);
    }
    if !STANDARD_RESIDUES.contains(residue.as_str()) {
        return None;
    }
    let apolar = AtomTyping {
        donor: false,
        acceptor: false,
        formal_charge: 0,
        aromatic: false,
    };
    Some(match atom.as_str() {
        "N" if residue != "PRO" => BACKBONE_NITROGEN,
        "O" | "OXT" => BACKBONE_OXYGEN,
        _ => apolar,
    })
}

/// Assigns donor/acceptor/charge/aromatic flags to every atom of `molecule`.
///
/// Atoms of standard residues take their flags from the residue table. Other heavy atoms are
/// typed from their element: N or O bonded to a hydrogen donates, O accepts, and N without
/// hydrogens and with fewer than three neighbours accepts. Formal charges already present on
/// non-standard atoms are kept.
pub fn assign_interaction_types(molecule: &mut Molecule) {
    let mut typings = Vec::with_capacity(molecule.len());
    for (index, atom) in molecule.atoms().iter().enumerate() {
        let residue_name = molecule
            .residue_of(atom)
            .map(|r| r.name.as_str())
            .unwrap_or("UNK");
        let typing = residue_atom_typing(residue_name, &atom.name).unwrap_or_else(|| {
            let has_hydrogen = molecule
                .neighbours(index)
                .any(|n| molecule.atoms()[n].is_hydrogen());
            let degree = molecule.neighbours(index).count();
            let (donor, acceptor) = match atom.element.as_str() {
                "O" => (has_hydrogen, true),
                "N" => (has_hydrogen, !has_hydrogen && degree < 3),
                _ => (false, false),
            };
            AtomTyping {
                donor,
                acceptor,
                formal_charge: atom.formal_charge,
                aromatic: atom.is_aromatic,
            }
        });
        typings.push(typing);
    }
    for (atom, typing) in molecule.atoms_mut().iter_mut().zip(typings) {
        atom.is_donor = typing.donor;
        atom.is_acceptor = typing.acceptor;
        atom.formal_charge = typing.formal_charge;
        atom.is_aromatic = typing.aromatic;
    }
    trace!(atoms = molecule.len(), "Assigned interaction types.");
}
