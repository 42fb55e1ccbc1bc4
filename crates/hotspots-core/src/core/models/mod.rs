//! Molecular data models: atoms, residues, molecules and the interaction channels that
//! classify them.

pub mod atom;
pub mod channel;
pub mod molecule;
