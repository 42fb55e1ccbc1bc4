//! Probe molecule libraries.
//!
//! Probes are small rigid fragments, one per interaction channel and size, sampled over the
//! weighted propensity maps. They are supplied as a TOML data file rather than compiled in.

pub mod library;
