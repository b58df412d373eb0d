// Align action orchestration
//
// Setup (`prepare`):
//   1. Filter library genes by chain
//   2. Decide the V feature correction (parameters still mutable)
//   3. Build the aligner from the final parameters
//   4. Register genes; fail if no V or J gene is usable
//
// Processing (`PreparedAligner::process`):
//   header -> ordered parallel alignment -> classify/aggregate -> footer
//
// `align_files` runs both phases from `AlignOptions`, opening the read
// source and failed-read sinks only after setup has succeeded.

use crate::core::io::{FailedReadSink, FastqFailedSink, FileReadSource, ReadSource};
use crate::core::types::Chains;
use crate::error::{AlignError, Result};
use crate::pipelines::vdjc::classifier::{EmptyAlignmentTemplate, OutputPolicy, ResultClassifier};
use crate::pipelines::vdjc::collaborators::{AlignmentWriter, GeneLibrary, PairedMode, VdjcAligner};
use crate::pipelines::vdjc::dispatch::{run_ordered, DispatchConfig, DispatchSummary};
use crate::pipelines::vdjc::feature_correction::{correct_v_feature, FeatureCorrection};
use crate::pipelines::vdjc::options::AlignOptions;
use crate::pipelines::vdjc::parameters::AlignerParameters;
use crate::pipelines::vdjc::registration::{register_genes, ExclusionWarnings, RegistrationSummary};
use crate::pipelines::vdjc::report::RunReport;
use crate::pipelines::vdjc::stats::{AlignerReport, ChainUsageStats};
use std::time::Instant;

/// Aligner with its genes registered, ready to process reads
pub struct PreparedAligner<A> {
    aligner: A,
    library_id: String,
    correction: FeatureCorrection,
    registration: RegistrationSummary,
    started: Instant,
}

/// Result of a processing run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dispatch: DispatchSummary,
    pub report: RunReport,
}

impl RunOutcome {
    pub fn aligner_report(&self) -> &AlignerReport {
        &self.report.aligner_report
    }

    pub fn chain_usage(&self) -> &ChainUsageStats {
        &self.report.chain_usage
    }
}

/// Run the setup phase.
///
/// # Arguments
/// * `parameters` - Parameters after presets and overrides
/// * `library` - Gene library
/// * `chains` - Chain filter applied to the library
/// * `paired` - Input pairing passed to `build`
/// * `warnings` - Excluded-gene warning policy
/// * `build` - Creates the aligner from the final parameters
pub fn prepare<L, A, B>(
    mut parameters: AlignerParameters,
    library: &L,
    chains: &Chains,
    paired: PairedMode,
    warnings: ExclusionWarnings,
    build: B,
) -> Result<PreparedAligner<A>>
where
    L: GeneLibrary + ?Sized,
    A: VdjcAligner,
    B: FnOnce(AlignerParameters, PairedMode) -> A,
{
    let started = Instant::now();

    let library_id = library.library_id();
    log::info!("Reference library: {}", library_id);

    let genes = library.genes(chains);
    log::debug!("{} genes selected for chains {}", genes.len(), chains);

    let correction = correct_v_feature(&mut parameters, &genes);

    let mut aligner = build(parameters, paired);
    let registration = register_genes(&mut aligner, genes, warnings)?;

    Ok(PreparedAligner {
        aligner,
        library_id,
        correction,
        registration,
        started,
    })
}

impl<A: VdjcAligner> PreparedAligner<A> {
    pub fn aligner(&self) -> &A {
        &self.aligner
    }

    pub fn parameters(&self) -> &AlignerParameters {
        self.aligner.parameters()
    }

    pub fn library_id(&self) -> &str {
        &self.library_id
    }

    pub fn correction(&self) -> &FeatureCorrection {
        &self.correction
    }

    pub fn registration(&self) -> &RegistrationSummary {
        &self.registration
    }

    /// Align every read of `source` and forward results in read order.
    ///
    /// # Arguments
    /// * `source` - Reads with contiguous ids
    /// * `config` - Worker pool and batching
    /// * `policy` - Metadata and write-all settings
    /// * `writer` - Alignment output, `None` to only aggregate
    /// * `failed_sink` - Destination for reads that failed alignment
    pub fn process<S: ReadSource + ?Sized>(
        &self,
        source: &mut S,
        config: &DispatchConfig,
        policy: OutputPolicy,
        mut writer: Option<&mut dyn AlignmentWriter>,
        failed_sink: Option<&mut dyn FailedReadSink>,
    ) -> Result<RunOutcome> {
        let parameters = self.parameters();
        if let Some(writer) = writer.as_mut() {
            writer
                .write_header(parameters, &self.registration.registered)
                .map_err(AlignError::Writer)?;
        }

        let mut chain_usage = ChainUsageStats::default();
        let mut aligner_report = AlignerReport::default();
        let template =
            EmptyAlignmentTemplate::new(parameters.configured_gene_types(), parameters.reads_layout);

        let mut classifier = ResultClassifier::new(policy, template, &mut chain_usage, &mut aligner_report)
            .with_writer(writer)
            .with_failed_sink(failed_sink);
        let dispatch = run_ordered(source, &self.aligner, config, |result| {
            classifier.classify(result).map(drop)
        })?;
        classifier.finish(dispatch.reads)?;

        log::debug!(
            "Processed {} reads in {} batches (peak reorder buffer {})",
            dispatch.reads,
            dispatch.batches,
            dispatch.peak_buffered
        );

        let report = RunReport::new(
            self.library_id.clone(),
            &self.correction,
            self.started.elapsed(),
            aligner_report,
            chain_usage,
        );
        Ok(RunOutcome { dispatch, report })
    }
}

/// Run the align action on the files named in `options`.
///
/// `resolve_library` is called with the `-b` library name and `-s` species
/// once the options are validated. `build` creates the aligner from the
/// final parameters. `writer` receives
/// the alignments unless the output name is "."; the report is logged and,
/// if requested, written as JSON.
pub fn align_files<R, L, A, B>(
    options: &AlignOptions,
    resolve_library: R,
    build: B,
    writer: Option<&mut dyn AlignmentWriter>,
    command_line: &str,
) -> Result<RunOutcome>
where
    R: FnOnce(&str, &str) -> Result<L>,
    L: GeneLibrary,
    A: VdjcAligner,
    B: FnOnce(AlignerParameters, PairedMode) -> A,
{
    options.validate()?;
    let parameters = options.aligner_parameters()?;
    let chains = options.chain_filter()?;
    let library = resolve_library(&options.library, &options.species)?;
    log::debug!(
        "Resolved library '{}' for species '{}': {}",
        options.library,
        options.species,
        library.library_id()
    );

    let prepared = prepare(
        parameters,
        &library,
        &chains,
        options.paired_mode(),
        options.exclusion_warnings(),
        build,
    )?;

    let inputs = options.input_files();
    let mut source = match inputs {
        [r1, r2] => FileReadSource::paired(r1, r2)?,
        [single] => FileReadSource::single(single)?,
        _ => return Err(AlignError::invalid_options("Expected one or two input files")),
    };

    let mut failed_sink = match (&options.not_aligned_r1, &options.not_aligned_r2) {
        (Some(r1), Some(r2)) => Some(FastqFailedSink::paired(r1, r2)?),
        (Some(r1), None) => Some(FastqFailedSink::single(r1)?),
        _ => None,
    };

    let writer = if options.writes_output() {
        writer
    } else {
        log::debug!("Output name is '.', alignments are not written");
        None
    };

    let outcome = prepared.process(
        &mut source,
        &options.dispatch_config(),
        options.output_policy(),
        writer,
        failed_sink.as_mut().map(|s| s as &mut dyn FailedReadSink),
    )?;

    let report = outcome.report.with_provenance(
        options.input_for_report(),
        options.output_name().display().to_string(),
        command_line,
    );
    report.log();
    if let Some(path) = &options.report {
        report.write_json(path)?;
    }

    Ok(RunOutcome {
        dispatch: outcome.dispatch,
        report,
    })
}
