// src/defaults.rs

use std::time::Duration;

// Dispatch Constants
pub const READS_PER_BATCH: usize = 64;
pub const PREFETCH_BATCHES: usize = 16;
/// Results channel holds this many batches worth of results per worker
pub const RESULT_BATCHES_PER_THREAD: usize = 2;
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

// Feature Correction Constants
pub const V_FEATURE_MISSING_RATIO: f64 = 0.9;
pub const V_FALLBACK_AVAILABLE_RATIO: f64 = 0.8;

// Other Constants
pub const VERBOSITY: i32 = 3;
pub const PARAMETERS_PRESET: &str = "default";
pub const LIBRARY: &str = "default";
pub const SPECIES: &str = "hs";
pub const CHAINS: &str = "ALL";
/// Output name meaning "do not write alignments"
pub const NO_OUTPUT: &str = ".";
