//! Numerical and spatial helpers shared by the engine stages: the bounded scalar minimizer
//! behind volume selection and the hydrogen-bond partner index used by extraction and
//! pharmacophore building.

pub mod minimize;
pub mod partners;
