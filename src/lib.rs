//! Ordered parallel V(D)J(C) alignment orchestration.
//!
//! Streams sequencing reads through a pluggable alignment engine on a worker
//! pool and reassembles the results in input order for persistence and
//! statistics. The alignment algorithm, gene library loading and alignment
//! file format are supplied by the caller through the traits in
//! `pipelines::vdjc::collaborators`.

pub mod core;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod pipelines;

pub use crate::core::types::{Alignment, AlignmentResult, GeneRecord, Read};
pub use crate::error::{AlignError, Result};
