//! # Engine Module
//!
//! The algorithms that turn raw interaction propensities into fragment hotspot maps, and the
//! machinery that drives the external tools producing those propensities.
//!
//! ## Overview
//!
//! A hotspot calculation runs in stages. Propensity maps for each interaction channel are
//! computed by an external knowledge-based tool, corrected and multiplied by a buriedness map
//! ([`weighting`]), then sampled with rigid molecular probes ([`sampler`]). The resulting
//! per-channel maps form a [`result::HotspotResult`], which can be partitioned into
//! individual hotspots ([`extraction`]), reduced to the best connected region of a target
//! volume ([`selection`]), or exported as a pharmacophore ([`pharmacophore`]).
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Sampling, extraction and selection parameters with
//!   validated builders
//! - **Weighting** ([`weighting`]) - Ligsite correction and buriedness weighting
//! - **Probe Sampling** ([`sampler`]) - Monte-Carlo rigid-probe scoring over weighted maps
//! - **Hotspot Extraction** ([`extraction`]) - Peak detection, feature assignment and
//!   composite hotspots
//! - **Best Continuous Volume** ([`selection`]) - Single-owner maps and cutoff search for a
//!   connected region of fixed volume
//! - **Pharmacophores** ([`pharmacophore`]) - Feature models and their export formats
//! - **External Jobs** ([`external`]) - Propensity and buriedness tool invocation on a worker
//!   pool
//! - **Results** ([`result`]) - The hotspot result container and its persistence
//! - **Progress Monitoring** ([`progress`]) and **Cancellation** ([`cancel`])
//! - **Error Handling** ([`error`]) - Engine-specific error types

pub mod cancel;
pub mod config;
pub mod error;
pub mod external;
pub mod extraction;
pub mod pharmacophore;
pub mod progress;
pub mod result;
pub mod sampler;
pub mod selection;
pub(crate) mod utils;
pub mod weighting;
