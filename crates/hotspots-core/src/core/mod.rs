//! # Core Module
//!
//! The stateless foundation of the hotspot library: volumetric grids, molecular models,
//! atom typing, probe libraries and file formats.
//!
//! ## Overview
//!
//! Everything in this module is plain data plus pure operations on it. Grids know nothing
//! about proteins, molecules know nothing about grids; the [`crate::engine`] layer is where
//! the two meet.
//!
//! ## Architecture
//!
//! - **Volumetric Grids** ([`grid`]) - Lattice storage, frame alignment, connected regions and
//!   filters
//! - **Molecular Representation** ([`models`]) - Atoms, residues, molecules and interaction
//!   channels
//! - **Atom Typing** ([`topology`]) - Donor/acceptor/charge assignment for structure atoms
//! - **Probe Libraries** ([`probes`]) - Rigid probe fragments per channel and size
//! - **File I/O** ([`io`]) - PDB structures, ASCII grid files and pocket-scan output
//! - **Geometry** ([`utils`]) - Random rotations and point helpers

pub mod grid;
pub mod io;
pub mod models;
pub mod probes;
pub mod topology;
pub mod utils;
