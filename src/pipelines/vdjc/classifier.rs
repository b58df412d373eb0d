// Per-result classification and aggregation
//
// Each ordered result ends in exactly one resolution:
//   aligned                      -> Emitted      (aggregated, written)
//   not aligned, write-all       -> Synthesized  (empty hits, aggregated, written)
//   not aligned otherwise        -> Skipped      (failed-read sink if any)

use crate::core::io::FailedReadSink;
use crate::core::types::{Alignment, AlignmentResult, GeneType, Read, ReadsLayout};
use crate::error::{AlignError, Result};
use crate::pipelines::vdjc::collaborators::AlignmentWriter;
use crate::pipelines::vdjc::stats::{AlignerReport, ChainUsageStats};
use std::collections::BTreeMap;

/// Terminal outcome of one read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Emitted,
    Synthesized,
    Skipped { sunk: bool },
}

/// What to keep and write for each read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputPolicy {
    /// Keep read headers on alignments
    pub save_description: bool,
    /// Keep read headers and sequences on alignments
    pub save_reads: bool,
    /// Write an empty alignment for every read that failed
    pub write_all: bool,
}

/// Placeholder builder for reads that failed alignment
#[derive(Debug, Clone)]
pub struct EmptyAlignmentTemplate {
    gene_types: Vec<GeneType>,
    reads_layout: ReadsLayout,
}

impl EmptyAlignmentTemplate {
    pub fn new(gene_types: Vec<GeneType>, reads_layout: ReadsLayout) -> Self {
        Self {
            gene_types,
            reads_layout,
        }
    }

    /// Empty hit list for every configured gene type; targets from the first
    /// target split of the reads layout
    pub fn build(&self, read: &Read) -> Alignment {
        let hits: BTreeMap<GeneType, _> = self.gene_types.iter().map(|gt| (*gt, Vec::new())).collect();
        let targets = self
            .reads_layout
            .create_targets(read)
            .into_iter()
            .next()
            .unwrap_or_default();
        Alignment::new(read.id, hits, targets)
    }
}

/// Resolves ordered results and forwards them to the writer and sink.
///
/// Borrows the accumulators and outputs for the duration of the run.
pub struct ResultClassifier<'a, W: ?Sized, K: ?Sized> {
    policy: OutputPolicy,
    template: EmptyAlignmentTemplate,
    stats: &'a mut ChainUsageStats,
    report: &'a mut AlignerReport,
    writer: Option<&'a mut W>,
    failed_sink: Option<&'a mut K>,
}

impl<'a> ResultClassifier<'a, dyn AlignmentWriter, dyn FailedReadSink> {
    /// Classifier without outputs; attach them with `with_writer` and
    /// `with_failed_sink`
    pub fn new(
        policy: OutputPolicy,
        template: EmptyAlignmentTemplate,
        stats: &'a mut ChainUsageStats,
        report: &'a mut AlignerReport,
    ) -> Self {
        Self {
            policy,
            template,
            stats,
            report,
            writer: None,
            failed_sink: None,
        }
    }
}

impl<'a, W: ?Sized, K: ?Sized> ResultClassifier<'a, W, K> {
    pub fn with_writer<W2: AlignmentWriter + ?Sized>(
        self,
        writer: Option<&'a mut W2>,
    ) -> ResultClassifier<'a, W2, K> {
        ResultClassifier {
            policy: self.policy,
            template: self.template,
            stats: self.stats,
            report: self.report,
            writer,
            failed_sink: self.failed_sink,
        }
    }

    pub fn with_failed_sink<K2: FailedReadSink + ?Sized>(
        self,
        failed_sink: Option<&'a mut K2>,
    ) -> ResultClassifier<'a, W, K2> {
        ResultClassifier {
            policy: self.policy,
            template: self.template,
            stats: self.stats,
            report: self.report,
            writer: self.writer,
            failed_sink,
        }
    }
}

impl<'a, W, K> ResultClassifier<'a, W, K>
where
    W: AlignmentWriter + ?Sized,
    K: FailedReadSink + ?Sized,
{
    pub fn classify(&mut self, result: AlignmentResult) -> Result<Resolution> {
        let AlignmentResult { read, alignment } = result;

        let (alignment, resolution) = match alignment {
            Some(alignment) => {
                self.report.on_aligned();
                (alignment, Resolution::Emitted)
            }
            None => {
                self.report.on_failed();
                if !self.policy.write_all {
                    return self.skip(&read);
                }
                self.report.on_synthesized();
                (self.template.build(&read), Resolution::Synthesized)
            }
        };

        self.emit(&read, alignment)?;
        Ok(resolution)
    }

    fn skip(&mut self, read: &Read) -> Result<Resolution> {
        let Some(sink) = self.failed_sink.as_mut() else {
            return Ok(Resolution::Skipped { sunk: false });
        };
        sink.write(read)?;
        self.report.on_sunk();
        Ok(Resolution::Skipped { sunk: true })
    }

    fn emit(&mut self, read: &Read, mut alignment: Alignment) -> Result<()> {
        self.stats.record(&alignment);
        if alignment.chimera {
            self.report.on_chimera();
        }

        let Some(writer) = self.writer.as_mut() else {
            return Ok(());
        };
        if self.policy.save_description || self.policy.save_reads {
            alignment.original_descriptions = Some(read.descriptions());
        }
        if self.policy.save_reads {
            alignment.original_sequences = Some(read.sequences());
        }
        writer.write(&alignment).map_err(AlignError::Writer)
    }

    /// Record the processed read count and flush the outputs
    pub fn finish(self, processed_reads: u64) -> Result<()> {
        if let Some(writer) = self.writer {
            writer.set_number_of_processed_reads(processed_reads);
            writer.finish().map_err(AlignError::Writer)?;
        }
        if let Some(sink) = self.failed_sink {
            sink.finish()?;
        }
        Ok(())
    }
}
