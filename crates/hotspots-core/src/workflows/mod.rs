//! # Workflows Module
//!
//! End-to-end procedures that produce a [`HotspotResult`](crate::engine::result::HotspotResult).
//!
//! ## Overview
//!
//! Each workflow loads what it needs, drives the engine through its phases with progress
//! reporting and cancellation, and returns a result ready for extraction, selection or
//! persistence.
//!
//! ## Architecture
//!
//! - **Calculation Workflow** ([`calculate`]) - From a protein structure: external propensity
//!   jobs, optional secondary buriedness, weighting and probe sampling.
//! - **Sampling Workflow** ([`sample`]) - From already weighted maps: probe lookup and
//!   sampling only.

pub mod calculate;
pub mod sample;
