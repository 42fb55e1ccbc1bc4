//! # Hotspots Core Library
//!
//! Fragment hotspot maps for protein binding sites: which regions of a pocket favour apolar,
//! hydrogen-bond donor, acceptor and charged fragments, and how strongly.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture:
//!
//! - **[`core`]: The Foundation.** Stateless data models (`Grid`, `Molecule`, `Channel`),
//!   atom typing, probe libraries and file formats.
//!
//! - **[`engine`]: The Logic Core.** The algorithms that turn propensity maps into hotspot
//!   maps: buriedness weighting, Monte-Carlo probe sampling, hotspot extraction, best
//!   continuous volume selection and pharmacophore export, plus the worker pool that drives
//!   the external propensity tool.
//!
//! - **[`workflows`]: The Public API.** End-to-end procedures that tie the `engine` and `core`
//!   together, from a protein structure (or precomputed weighted maps) to a `HotspotResult`.

pub mod core;
pub mod engine;
pub mod workflows;
