//! Capabilities the pipeline drives but does not implement.
//!
//! - `GeneLibrary`: supplies reference genes filtered by chain
//! - `VdjcAligner`: scores reads against registered genes
//! - `AlignmentWriter`: persists the ordered alignment stream
//!
//! The aligner is built by the caller from the final `AlignerParameters`
//! (after feature correction), so parameters are never mutated once genes
//! are registered.

use crate::core::types::{Alignment, AlignmentResult, Chains, GeneRecord, Read};
use crate::pipelines::vdjc::parameters::AlignerParameters;

// ============================================================================
// GENE LIBRARY
// ============================================================================

pub trait GeneLibrary {
    /// Identifier logged at the start of a run (name, species, checksum...)
    fn library_id(&self) -> String;

    /// Genes of the requested chains, in library order
    fn genes(&self, chains: &Chains) -> Vec<GeneRecord>;
}

impl<L: GeneLibrary + ?Sized> GeneLibrary for &L {
    fn library_id(&self) -> String {
        (**self).library_id()
    }

    fn genes(&self, chains: &Chains) -> Vec<GeneRecord> {
        (**self).genes(chains)
    }
}

/// Library backed by a fixed list of genes
#[derive(Debug, Clone, Default)]
pub struct InMemoryGeneLibrary {
    id: String,
    genes: Vec<GeneRecord>,
}

impl InMemoryGeneLibrary {
    pub fn new(id: impl Into<String>, genes: Vec<GeneRecord>) -> Self {
        Self {
            id: id.into(),
            genes,
        }
    }
}

impl GeneLibrary for InMemoryGeneLibrary {
    fn library_id(&self) -> String {
        self.id.clone()
    }

    fn genes(&self, chains: &Chains) -> Vec<GeneRecord> {
        self.genes
            .iter()
            .filter(|g| chains.contains(g.chain))
            .cloned()
            .collect()
    }
}

// ============================================================================
// ALIGNER
// ============================================================================

/// Input pairing handed to the aligner builder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairedMode {
    pub paired: bool,
    /// Try to merge overlapping mates before alignment
    pub merge: bool,
}

/// V(D)J(C) alignment engine
///
/// `align` and `align_batch` run concurrently on worker threads and must not
/// mutate shared state; `add_gene` is only called before the parallel phase.
pub trait VdjcAligner: Sync {
    fn parameters(&self) -> &AlignerParameters;

    fn add_gene(&mut self, gene: GeneRecord);

    /// Number of registered V genes
    fn v_genes_to_align(&self) -> usize;

    /// Number of registered J genes
    fn j_genes_to_align(&self) -> usize;

    /// Align one read; `None` when no acceptable alignment exists
    fn align(&self, read: &Read) -> Option<Alignment>;

    /// Align a batch, returning exactly one result per read
    fn align_batch(&self, reads: Vec<Read>) -> Vec<AlignmentResult> {
        reads
            .into_iter()
            .map(|read| {
                let alignment = self.align(&read);
                AlignmentResult { read, alignment }
            })
            .collect()
    }
}

// ============================================================================
// ALIGNMENT WRITER
// ============================================================================

/// Sink for the ordered alignment stream
pub trait AlignmentWriter {
    fn write_header(
        &mut self,
        parameters: &AlignerParameters,
        genes: &[GeneRecord],
    ) -> anyhow::Result<()>;

    fn write(&mut self, alignment: &Alignment) -> anyhow::Result<()>;

    /// Total reads pulled from the source, recorded in the output footer
    fn set_number_of_processed_reads(&mut self, count: u64);

    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<W: AlignmentWriter + ?Sized> AlignmentWriter for &mut W {
    fn write_header(
        &mut self,
        parameters: &AlignerParameters,
        genes: &[GeneRecord],
    ) -> anyhow::Result<()> {
        (**self).write_header(parameters, genes)
    }

    fn write(&mut self, alignment: &Alignment) -> anyhow::Result<()> {
        (**self).write(alignment)
    }

    fn set_number_of_processed_reads(&mut self, count: u64) {
        (**self).set_number_of_processed_reads(count)
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        (**self).finish()
    }
}

/// Writer that keeps everything in memory
#[derive(Debug, Default)]
pub struct InMemoryAlignmentWriter {
    pub parameters: Option<AlignerParameters>,
    pub genes: Vec<GeneRecord>,
    pub alignments: Vec<Alignment>,
    pub processed_reads: Option<u64>,
}

impl AlignmentWriter for InMemoryAlignmentWriter {
    fn write_header(
        &mut self,
        parameters: &AlignerParameters,
        genes: &[GeneRecord],
    ) -> anyhow::Result<()> {
        if self.parameters.is_some() {
            anyhow::bail!("header already written");
        }
        self.parameters = Some(parameters.clone());
        self.genes = genes.to_vec();
        Ok(())
    }

    fn write(&mut self, alignment: &Alignment) -> anyhow::Result<()> {
        if self.parameters.is_none() {
            anyhow::bail!("alignment written before header");
        }
        self.alignments.push(alignment.clone());
        Ok(())
    }

    fn set_number_of_processed_reads(&mut self, count: u64) {
        self.processed_reads = Some(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Chain, GeneType, Partitioning, SequenceRecord, SequenceWithQuality};
    use std::collections::BTreeMap;

    fn gene(name: &str, chain: Chain) -> GeneRecord {
        GeneRecord {
            name: name.to_string(),
            gene_type: GeneType::Variable,
            chain,
            functional: true,
            partitioning: Partitioning::default(),
        }
    }

    struct EvenIdAligner(AlignerParameters);

    impl VdjcAligner for EvenIdAligner {
        fn parameters(&self) -> &AlignerParameters {
            &self.0
        }

        fn add_gene(&mut self, _gene: GeneRecord) {}

        fn v_genes_to_align(&self) -> usize {
            0
        }

        fn j_genes_to_align(&self) -> usize {
            0
        }

        fn align(&self, read: &Read) -> Option<Alignment> {
            (read.id % 2 == 0).then(|| Alignment::new(read.id, BTreeMap::new(), read.sequences()))
        }
    }

    #[test]
    fn test_library_filters_by_chain() {
        let library = InMemoryGeneLibrary::new(
            "lib",
            vec![gene("IGHV1", Chain::IGH), gene("TRBV2", Chain::TRB), gene("IGHV3", Chain::IGH)],
        );
        let names: Vec<String> = library
            .genes(&Chains::of(&[Chain::IGH]))
            .into_iter()
            .map(|g| g.name)
            .collect();
        assert_eq!(names, vec!["IGHV1", "IGHV3"]);
        assert_eq!(library.genes(&Chains::all()).len(), 3);
        assert_eq!(library.library_id(), "lib");
    }

    #[test]
    fn test_default_align_batch_keeps_one_result_per_read() {
        let aligner = EvenIdAligner(AlignerParameters::default());
        let reads: Vec<Read> = (10..15)
            .map(|id| {
                Read::single(
                    id,
                    SequenceRecord {
                        description: format!("r{}", id),
                        data: SequenceWithQuality::new(b"ACGT".to_vec(), b"IIII".to_vec()),
                    },
                )
            })
            .collect();

        let results = aligner.align_batch(reads);
        assert_eq!(results.iter().map(|r| r.read.id).collect::<Vec<_>>(), vec![10, 11, 12, 13, 14]);
        assert_eq!(
            results.iter().map(|r| r.is_aligned()).collect::<Vec<_>>(),
            vec![true, false, true, false, true]
        );
    }

    #[test]
    fn test_memory_writer_requires_header() {
        let mut writer = InMemoryAlignmentWriter::default();
        let alignment = Alignment::new(0, BTreeMap::new(), vec![]);
        assert!(writer.write(&alignment).is_err());

        writer.write_header(&AlignerParameters::default(), &[]).unwrap();
        writer.write(&alignment).unwrap();
        writer.set_number_of_processed_reads(1);
        assert_eq!(writer.alignments.len(), 1);
        assert_eq!(writer.processed_reads, Some(1));
        assert!(writer.write_header(&AlignerParameters::default(), &[]).is_err());
    }
}
