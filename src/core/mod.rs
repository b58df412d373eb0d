//! Core components shared by the alignment pipeline.
//!
//! - `types`: reads, genes, chains and alignments
//! - `gene_feature`: gene sub-regions used as alignment targets
//! - `io`: read sources and failed-read sinks

pub mod gene_feature;
pub mod io;
pub mod types;
