//! Alignment pipelines.
//!
//! - `vdjc`: ordered parallel V(D)J(C) alignment of sequencing reads
//!   against a gene library

pub mod vdjc;
