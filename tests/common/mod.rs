// Shared fixtures for the integration tests: a scripted aligner, an
// in-memory read source and gene library builders.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use vdjc_align::core::gene_feature::AnchorPoint;
use vdjc_align::core::io::ReadSource;
use vdjc_align::core::types::{
    Alignment, Chain, GeneRecord, GeneType, Hit, Partitioning, Read, SequenceRecord,
    SequenceWithQuality,
};
use vdjc_align::pipelines::vdjc::{AlignerParameters, AlignmentWriter, PairedMode, VdjcAligner};

// ============================================================================
// ALIGNER
// ============================================================================

/// Aligner with scripted outcomes per read id
///
/// Reads listed in `failing` fail alignment, reads in `chimeric` get a
/// chimera flag. Every fifth read sleeps briefly so that workers finish
/// out of order.
pub struct ScriptedAligner {
    pub parameters: AlignerParameters,
    pub paired: PairedMode,
    pub genes: Vec<GeneRecord>,
    failing: HashSet<u64>,
    chimeric: HashSet<u64>,
    pub calls: AtomicU64,
}

impl ScriptedAligner {
    pub fn new(parameters: AlignerParameters, paired: PairedMode) -> Self {
        Self {
            parameters,
            paired,
            genes: Vec::new(),
            failing: HashSet::new(),
            chimeric: HashSet::new(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn failing(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.failing.extend(ids);
        self
    }

    pub fn chimeric(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.chimeric.extend(ids);
        self
    }

    /// Registers one V and one J gene directly
    pub fn with_default_genes(mut self) -> Self {
        self.add_gene(full_v_gene("TRBV1", Chain::TRB));
        self.add_gene(j_gene("TRBJ1", Chain::TRB));
        self
    }

    fn count(&self, gene_type: GeneType) -> usize {
        self.genes.iter().filter(|g| g.gene_type == gene_type).count()
    }
}

fn hit(name: &str, gene_type: GeneType, chain: Chain, score: f32) -> Hit {
    Hit {
        gene_name: name.to_string(),
        gene_type,
        chain,
        score,
    }
}

impl VdjcAligner for ScriptedAligner {
    fn parameters(&self) -> &AlignerParameters {
        &self.parameters
    }

    fn add_gene(&mut self, gene: GeneRecord) {
        self.genes.push(gene);
    }

    fn v_genes_to_align(&self) -> usize {
        self.count(GeneType::Variable)
    }

    fn j_genes_to_align(&self) -> usize {
        self.count(GeneType::Joining)
    }

    fn align(&self, read: &Read) -> Option<Alignment> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if read.id % 5 == 0 {
            std::thread::sleep(Duration::from_micros(50));
        }
        if self.failing.contains(&read.id) {
            return None;
        }

        let chimera = self.chimeric.contains(&read.id);
        let j_chain = if chimera { Chain::TRA } else { Chain::TRB };
        let mut hits = BTreeMap::new();
        hits.insert(
            GeneType::Variable,
            vec![hit("TRBV1", GeneType::Variable, Chain::TRB, 200.0)],
        );
        hits.insert(
            GeneType::Joining,
            vec![hit("TRBJ1", GeneType::Joining, j_chain, 60.0)],
        );
        let targets = self
            .parameters
            .reads_layout
            .create_targets(read)
            .into_iter()
            .next()
            .unwrap_or_default();

        let mut alignment = Alignment::new(read.id, hits, targets);
        alignment.chimera = chimera;
        Some(alignment)
    }
}

// ============================================================================
// READS
// ============================================================================

pub fn mate(description: String, sequence: &[u8]) -> SequenceRecord {
    SequenceRecord {
        description,
        data: SequenceWithQuality::new(sequence.to_vec(), vec![b'I'; sequence.len()]),
    }
}

/// In-memory source over reads with ids `0..count`
pub struct VecReadSource {
    reads: std::vec::IntoIter<Read>,
    total: u64,
    produced: u64,
    paired: bool,
}

impl VecReadSource {
    pub fn single(count: u64) -> Self {
        Self::from_reads(
            (0..count)
                .map(|id| Read::single(id, mate(format!("read{}", id), b"ACGTACGTAC")))
                .collect(),
            false,
        )
    }

    pub fn paired(count: u64) -> Self {
        Self::from_reads(
            (0..count)
                .map(|id| {
                    Read::paired(
                        id,
                        mate(format!("read{}/1", id), b"ACGTTT"),
                        mate(format!("read{}/2", id), b"AAACCC"),
                    )
                })
                .collect(),
            true,
        )
    }

    pub fn from_reads(reads: Vec<Read>, paired: bool) -> Self {
        Self {
            total: reads.len() as u64,
            reads: reads.into_iter(),
            produced: 0,
            paired,
        }
    }
}

impl ReadSource for VecReadSource {
    fn next_read(&mut self) -> io::Result<Option<Read>> {
        let read = self.reads.next();
        if read.is_some() {
            self.produced += 1;
        }
        Ok(read)
    }

    fn number_of_reads(&self) -> u64 {
        self.produced
    }

    fn progress(&self) -> Option<f64> {
        Some(self.produced as f64 / self.total.max(1) as f64)
    }

    fn is_paired(&self) -> bool {
        self.paired
    }
}

// ============================================================================
// GENES
// ============================================================================

const FULL_V: &[AnchorPoint] = &[
    AnchorPoint::L1Begin,
    AnchorPoint::L1End,
    AnchorPoint::L2Begin,
    AnchorPoint::FR1Begin,
    AnchorPoint::VEnd,
];

fn gene(name: &str, gene_type: GeneType, chain: Chain, anchors: &[AnchorPoint]) -> GeneRecord {
    GeneRecord {
        name: name.to_string(),
        gene_type,
        chain,
        functional: true,
        partitioning: Partitioning::new(anchors.iter().copied()),
    }
}

pub fn full_v_gene(name: &str, chain: Chain) -> GeneRecord {
    gene(name, GeneType::Variable, chain, FULL_V)
}

/// V gene annotated from FR1 only (no leader)
pub fn fr1_v_gene(name: &str, chain: Chain) -> GeneRecord {
    gene(name, GeneType::Variable, chain, &[AnchorPoint::FR1Begin, AnchorPoint::VEnd])
}

/// V gene with no usable annotation
pub fn bare_v_gene(name: &str, chain: Chain) -> GeneRecord {
    gene(name, GeneType::Variable, chain, &[])
}

pub fn j_gene(name: &str, chain: Chain) -> GeneRecord {
    gene(name, GeneType::Joining, chain, &[AnchorPoint::JBegin, AnchorPoint::FR4End])
}

/// `total` V genes of which `missing` lack the default V feature and
/// `fallback` of those carry VRegionWithP, plus one J gene
pub fn v_library(total: usize, missing: usize, fallback: usize) -> Vec<GeneRecord> {
    let mut genes: Vec<GeneRecord> = (0..total)
        .map(|i| {
            let name = format!("TRBV{}", i);
            if i >= missing {
                full_v_gene(&name, Chain::TRB)
            } else if i < fallback {
                fr1_v_gene(&name, Chain::TRB)
            } else {
                bare_v_gene(&name, Chain::TRB)
            }
        })
        .collect();
    genes.push(j_gene("TRBJ1", Chain::TRB));
    genes
}

// ============================================================================
// WRITERS
// ============================================================================

/// Writer that fails once `fail_after` alignments have been written
#[derive(Default)]
pub struct FailingWriter {
    pub fail_after: usize,
    pub written: usize,
}

impl AlignmentWriter for FailingWriter {
    fn write_header(
        &mut self,
        _parameters: &AlignerParameters,
        _genes: &[GeneRecord],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    fn write(&mut self, _alignment: &Alignment) -> anyhow::Result<()> {
        if self.written >= self.fail_after {
            anyhow::bail!("disk full after {} alignments", self.written);
        }
        self.written += 1;
        Ok(())
    }

    fn set_number_of_processed_reads(&mut self, _count: u64) {}
}
