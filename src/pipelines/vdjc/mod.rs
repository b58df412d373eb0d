//! V(D)J(C) alignment pipeline.
//!
//! Reads are pulled lazily from a `ReadSource`, aligned in parallel by a
//! caller-supplied `VdjcAligner`, and delivered to the writer in strict read
//! order.
//!
//! # Module Organization
//!
//! - Setup
//!   - `parameters` - Aligner parameters, presets and `-O` overrides
//!   - `feature_correction` - One-time V feature-to-align fallback
//!   - `registration` - Gene registration and the V/J precondition
//!
//! - Processing
//!   - `dispatch` - Batching, worker pool, ordered delivery
//!   - `ordering` - Reorder buffer keyed by read id
//!   - `classifier` - Emitted / synthesized / skipped resolution
//!   - `stats` - Chain usage and run counters
//!
//! - Surface
//!   - `collaborators` - Gene library, aligner and writer traits
//!   - `options` - `clap` options of the align action
//!   - `orchestrator` - `prepare`, `PreparedAligner::process`, `align_files`
//!   - `report` - End-of-run report

// === Setup ===
pub mod feature_correction;
pub mod parameters;
pub mod registration;

// === Processing ===
pub mod classifier;
pub mod dispatch;
pub mod ordering;
pub mod stats;

// === Surface ===
pub mod collaborators;
pub mod options;
pub mod orchestrator;
pub mod report;

pub use collaborators::{
    AlignmentWriter, GeneLibrary, InMemoryAlignmentWriter, InMemoryGeneLibrary, PairedMode,
    VdjcAligner,
};
pub use dispatch::{DispatchConfig, DispatchSummary};
pub use options::AlignOptions;
pub use orchestrator::{align_files, prepare, PreparedAligner, RunOutcome};
pub use parameters::AlignerParameters;
