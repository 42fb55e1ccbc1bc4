//! Provides input/output functionality for structure and volumetric file formats.
//!
//! Structures are read and written as PDB, volumetric maps as InsightII-style ASCII grids
//! (the format the propensity tool emits and that persisted results use), and the secondary
//! buriedness tool's pocket output is parsed directly onto a grid.

pub mod buriedness;
pub mod grd;
pub mod pdb;
pub mod traits;
