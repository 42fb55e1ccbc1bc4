//! Interaction typing of structure atoms.
//!
//! Standard amino-acid atoms are typed from a static residue/atom table; everything else
//! (ligands, waters, cofactors) is typed from its element and bonded hydrogens.

pub mod rules;
pub mod typing;
