//! Domain types shared by the I/O adapters and the alignment pipeline.
//!
//! - `Read`: one sequencing observation (single or paired) with an ordinal id
//! - `GeneRecord`: a reference gene and the anchor points annotated on it
//! - `Alignment` / `AlignmentResult`: what the aligner returns for a read

use crate::core::gene_feature::{AnchorPoint, GeneFeature};
use bio::alphabets::dna;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// GENES
// ============================================================================

/// Gene segment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum GeneType {
    Variable,
    Diversity,
    Joining,
    Constant,
}

impl GeneType {
    pub const ALL: [GeneType; 4] = [
        GeneType::Variable,
        GeneType::Diversity,
        GeneType::Joining,
        GeneType::Constant,
    ];

    pub fn letter(self) -> char {
        match self {
            GeneType::Variable => 'V',
            GeneType::Diversity => 'D',
            GeneType::Joining => 'J',
            GeneType::Constant => 'C',
        }
    }
}

impl fmt::Display for GeneType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// Immunological chain (locus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Chain {
    TRA,
    TRB,
    TRG,
    TRD,
    IGH,
    IGK,
    IGL,
}

impl Chain {
    pub const ALL: [Chain; 7] = [
        Chain::TRA,
        Chain::TRB,
        Chain::TRG,
        Chain::TRD,
        Chain::IGH,
        Chain::IGK,
        Chain::IGL,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Chain::TRA => "TRA",
            Chain::TRB => "TRB",
            Chain::TRG => "TRG",
            Chain::TRD => "TRD",
            Chain::IGH => "IGH",
            Chain::IGK => "IGK",
            Chain::IGL => "IGL",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Set of chains, used both as a library filter and as hit annotation
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Chains(BTreeSet<Chain>);

impl Chains {
    pub fn all() -> Self {
        Chains(Chain::ALL.into_iter().collect())
    }

    pub fn empty() -> Self {
        Chains(BTreeSet::new())
    }

    pub fn of(chains: &[Chain]) -> Self {
        Chains(chains.iter().copied().collect())
    }

    pub fn contains(&self, chain: Chain) -> bool {
        self.0.contains(&chain)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Chain> + '_ {
        self.0.iter().copied()
    }

    pub fn intersection(&self, other: &Chains) -> Chains {
        Chains(self.0.intersection(&other.0).copied().collect())
    }
}

impl FromIterator<Chain> for Chains {
    fn from_iter<I: IntoIterator<Item = Chain>>(iter: I) -> Self {
        Chains(iter.into_iter().collect())
    }
}

impl FromStr for Chains {
    type Err = String;

    /// Parses `ALL`, `TCR`, `IG` or a comma-separated list such as `IGH,TRB`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chains = BTreeSet::new();
        for token in s.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            match token.to_ascii_uppercase().as_str() {
                "ALL" => chains.extend(Chain::ALL),
                "TCR" => chains.extend([Chain::TRA, Chain::TRB, Chain::TRG, Chain::TRD]),
                "IG" => chains.extend([Chain::IGH, Chain::IGK, Chain::IGL]),
                upper => {
                    let chain = Chain::ALL
                        .into_iter()
                        .find(|c| c.name() == upper)
                        .ok_or_else(|| format!("Unknown chain: {}", token))?;
                    chains.insert(chain);
                }
            }
        }
        if chains.is_empty() {
            return Err(format!("No chains specified: '{}'", s));
        }
        Ok(Chains(chains))
    }
}

impl fmt::Display for Chains {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|c| c.name()).collect();
        f.write_str(&names.join(","))
    }
}

/// Anchor points annotated on a gene
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Partitioning {
    available: BTreeSet<AnchorPoint>,
}

impl Partitioning {
    pub fn new(anchors: impl IntoIterator<Item = AnchorPoint>) -> Self {
        Self {
            available: anchors.into_iter().collect(),
        }
    }

    pub fn is_available(&self, feature: &GeneFeature) -> bool {
        feature.anchors().all(|a| self.available.contains(&a))
    }
}

/// Reference gene as supplied by the gene library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneRecord {
    pub name: String,
    pub gene_type: GeneType,
    pub chain: Chain,
    pub functional: bool,
    pub partitioning: Partitioning,
}

impl GeneRecord {
    pub fn has_feature(&self, feature: &GeneFeature) -> bool {
        self.partitioning.is_available(feature)
    }
}

// ============================================================================
// READS
// ============================================================================

/// Nucleotide sequence with per-base qualities (ASCII Phred+33)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SequenceWithQuality {
    pub sequence: Vec<u8>,
    pub quality: Vec<u8>,
}

impl SequenceWithQuality {
    pub fn new(sequence: impl Into<Vec<u8>>, quality: impl Into<Vec<u8>>) -> Self {
        Self {
            sequence: sequence.into(),
            quality: quality.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn reverse_complement(&self) -> Self {
        Self {
            sequence: dna::revcomp(&self.sequence),
            quality: self.quality.iter().rev().copied().collect(),
        }
    }
}

/// One mate of a read: header description plus data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRecord {
    pub description: String,
    pub data: SequenceWithQuality,
}

/// A sequencing read: one mate (single-end) or two (paired-end)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub id: u64,
    mates: Vec<SequenceRecord>,
}

impl Read {
    pub fn single(id: u64, mate: SequenceRecord) -> Self {
        Self {
            id,
            mates: vec![mate],
        }
    }

    pub fn paired(id: u64, r1: SequenceRecord, r2: SequenceRecord) -> Self {
        Self {
            id,
            mates: vec![r1, r2],
        }
    }

    pub fn is_paired(&self) -> bool {
        self.mates.len() == 2
    }

    pub fn number_of_mates(&self) -> usize {
        self.mates.len()
    }

    pub fn mates(&self) -> &[SequenceRecord] {
        &self.mates
    }

    pub fn mate(&self, i: usize) -> &SequenceRecord {
        &self.mates[i]
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.mates.iter().map(|m| m.description.clone()).collect()
    }

    pub fn sequences(&self) -> Vec<SequenceWithQuality> {
        self.mates.iter().map(|m| m.data.clone()).collect()
    }
}

/// Relative orientation of paired-end mates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadsLayout {
    /// R1 and R2 read opposite strands (standard Illumina PE)
    #[default]
    Opposite,
    Collinear,
    Unknown,
}

impl ReadsLayout {
    /// Candidate target splits for a read, most likely first.
    pub fn create_targets(self, read: &Read) -> Vec<Vec<SequenceWithQuality>> {
        if !read.is_paired() {
            return vec![vec![read.mate(0).data.clone()]];
        }
        let r1 = &read.mate(0).data;
        let r2 = &read.mate(1).data;
        let opposite = vec![r1.clone(), r2.reverse_complement()];
        let collinear = vec![r1.clone(), r2.clone()];
        match self {
            ReadsLayout::Opposite => vec![opposite],
            ReadsLayout::Collinear => vec![collinear],
            ReadsLayout::Unknown => vec![opposite, collinear],
        }
    }
}

// ============================================================================
// ALIGNMENTS
// ============================================================================

/// Scored match of a read against a reference gene
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub gene_name: String,
    pub gene_type: GeneType,
    pub chain: Chain,
    pub score: f32,
}

/// V(D)J(C) alignment of one read
#[derive(Debug, Clone, PartialEq)]
pub struct Alignment {
    pub read_id: u64,
    /// Hits per configured gene type, best first; an empty list means no hit
    pub hits: BTreeMap<GeneType, Vec<Hit>>,
    pub targets: Vec<SequenceWithQuality>,
    /// V and J hits belong to conflicting loci
    pub chimera: bool,
    pub original_descriptions: Option<Vec<String>>,
    pub original_sequences: Option<Vec<SequenceWithQuality>>,
}

impl Alignment {
    pub fn new(
        read_id: u64,
        hits: BTreeMap<GeneType, Vec<Hit>>,
        targets: Vec<SequenceWithQuality>,
    ) -> Self {
        Self {
            read_id,
            hits,
            targets,
            chimera: false,
            original_descriptions: None,
            original_sequences: None,
        }
    }

    pub fn hits(&self, gene_type: GeneType) -> &[Hit] {
        self.hits.get(&gene_type).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_hits(&self) -> bool {
        self.hits.values().any(|h| !h.is_empty())
    }

    /// Chains of the top-scoring hits of one gene type (ties included)
    pub fn top_chains(&self, gene_type: GeneType) -> Chains {
        let hits = self.hits(gene_type);
        let Some(best) = hits.iter().map(|h| h.score).reduce(f32::max) else {
            return Chains::empty();
        };
        hits.iter()
            .filter(|h| h.score >= best)
            .map(|h| h.chain)
            .collect()
    }

    /// Chains shared by the top hits of every gene type that has hits
    pub fn dominant_chains(&self) -> Chains {
        GeneType::ALL
            .into_iter()
            .map(|gt| self.top_chains(gt))
            .filter(|c| !c.is_empty())
            .reduce(|acc, c| acc.intersection(&c))
            .unwrap_or_default()
    }
}

/// Aligner output for one read; `alignment` is `None` when alignment failed
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentResult {
    pub read: Read,
    pub alignment: Option<Alignment>,
}

impl AlignmentResult {
    pub fn aligned(read: Read, alignment: Alignment) -> Self {
        Self {
            read,
            alignment: Some(alignment),
        }
    }

    pub fn failed(read: Read) -> Self {
        Self {
            read,
            alignment: None,
        }
    }

    pub fn is_aligned(&self) -> bool {
        self.alignment.is_some()
    }
}
