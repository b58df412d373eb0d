//! Error types for the alignment orchestration pipeline.

use crate::core::types::GeneType;
use thiserror::Error;

/// Fatal errors that abort an alignment run.
///
/// Per-read alignment failures are not errors; they are resolved by the
/// classifier (synthesized or skipped) and never surface here.
#[derive(Error, Debug)]
pub enum AlignError {
    /// No gene of a mandatory type survived feature filtering
    #[error(
        "No {gene_type} genes to align. Aborting execution. See warnings for more info \
         (enable warnings and raise verbosity)."
    )]
    NoUsableGenes { gene_type: GeneType },

    /// A `-O key=value` override could not be applied
    #[error("Failed to override parameter '{key}': {message}")]
    InvalidOverride { key: String, message: String },

    /// Unknown aligner parameters preset name
    #[error("Unknown aligner parameters: {0}")]
    UnknownPreset(String),

    /// The segments library named by `-b`/`-s` could not be resolved
    #[error("Library '{library}' has no genes for species '{species}'")]
    LibraryNotFound { library: String, species: String },

    /// Inconsistent option combination
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// I/O errors on the read source, failed-read sinks or report file
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Alignment writer failure
    #[error("Alignment writer error: {0:#}")]
    Writer(anyhow::Error),

    /// Worker pool could not be created
    #[error("Failed to create alignment thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// `align_batch` returned a different number of results than reads
    #[error("Aligner returned {returned} results for a batch of {expected} reads")]
    ResultCountMismatch { expected: usize, returned: usize },

    /// `align_batch` returned results out of read order
    #[error("Aligner returned the result of read {found} where read {expected} was expected")]
    ResultOrderMismatch { expected: u64, found: u64 },

    /// A pipeline thread panicked
    #[error("Pipeline thread '{0}' panicked")]
    PipelinePanicked(&'static str),
}

/// Type alias for Results using AlignError
pub type Result<T> = std::result::Result<T, AlignError>;

impl AlignError {
    /// Create an override error
    pub fn invalid_override(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidOverride {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an invalid options error
    pub fn invalid_options(message: impl Into<String>) -> Self {
        Self::InvalidOptions(message.into())
    }
}

impl From<serde_json::Error> for AlignError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(err.into())
    }
}
