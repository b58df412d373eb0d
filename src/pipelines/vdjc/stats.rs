//! Run accumulators: chain usage and the aligner report.
//!
//! Both are plain values owned by the orchestrator and updated by the
//! classifier on the consumer thread, one update per event.

use crate::core::types::{Alignment, Chain};
use serde::Serialize;
use std::collections::BTreeMap;

/// Per-chain usage over emitted alignments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainUsageStats {
    total: u64,
    chimeras: u64,
    chains: BTreeMap<Chain, u64>,
}

impl ChainUsageStats {
    /// Count one emitted alignment
    ///
    /// Chimeric alignments only increment the chimera counter; otherwise
    /// every chain shared by the top hits is incremented.
    pub fn record(&mut self, alignment: &Alignment) {
        self.total += 1;
        if alignment.chimera {
            self.chimeras += 1;
            return;
        }
        for chain in alignment.dominant_chains().iter() {
            *self.chains.entry(chain).or_insert(0) += 1;
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn chimeras(&self) -> u64 {
        self.chimeras
    }

    pub fn count(&self, chain: Chain) -> u64 {
        self.chains.get(&chain).copied().unwrap_or(0)
    }

    /// Chains with a non-zero count, in chain order
    pub fn iter(&self) -> impl Iterator<Item = (Chain, u64)> + '_ {
        self.chains.iter().map(|(c, n)| (*c, *n))
    }

    fn percent(&self, n: u64) -> f64 {
        percent(n, self.total)
    }

    pub fn log_summary(&self) {
        log::info!(
            "Chimeras: {} ({:.2}%)",
            self.chimeras,
            self.percent(self.chimeras)
        );
        for (chain, n) in self.iter() {
            log::info!("{} chains: {} ({:.2}%)", chain, n, self.percent(n));
        }
    }
}

/// Run counters
///
/// `aligned + not_aligned == total_reads`; of the not aligned reads,
/// `synthesized` were written as placeholders and the rest skipped
/// (`sunk` of them to the failed-read sink).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlignerReport {
    pub total_reads: u64,
    pub aligned: u64,
    pub not_aligned: u64,
    pub synthesized: u64,
    pub sunk: u64,
    pub chimeras: u64,
}

impl AlignerReport {
    pub fn on_aligned(&mut self) {
        self.total_reads += 1;
        self.aligned += 1;
    }

    pub fn on_failed(&mut self) {
        self.total_reads += 1;
        self.not_aligned += 1;
    }

    pub fn on_synthesized(&mut self) {
        self.synthesized += 1;
    }

    pub fn on_sunk(&mut self) {
        self.sunk += 1;
    }

    pub fn on_chimera(&mut self) {
        self.chimeras += 1;
    }

    /// Failed reads that were neither synthesized nor written
    pub fn skipped(&self) -> u64 {
        self.not_aligned - self.synthesized
    }

    pub fn aligned_percent(&self) -> f64 {
        percent(self.aligned, self.total_reads)
    }

    pub fn log_summary(&self) {
        log::info!("Total sequencing reads: {}", self.total_reads);
        log::info!(
            "Successfully aligned reads: {} ({:.2}%)",
            self.aligned,
            self.aligned_percent()
        );
        log::info!(
            "Not aligned reads: {} ({:.2}%)",
            self.not_aligned,
            percent(self.not_aligned, self.total_reads)
        );
        if self.synthesized > 0 {
            log::info!("Empty alignments written for not aligned reads: {}", self.synthesized);
        }
        if self.sunk > 0 {
            log::info!("Not aligned reads written to file: {}", self.sunk);
        }
        log::info!(
            "Chimeras: {} ({:.2}%)",
            self.chimeras,
            percent(self.chimeras, self.total_reads)
        );
    }
}

fn percent(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        100.0 * n as f64 / total as f64
    }
}
