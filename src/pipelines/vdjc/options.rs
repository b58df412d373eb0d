use crate::core::types::Chains;
use crate::defaults;
use crate::error::{AlignError, Result};
use crate::pipelines::vdjc::classifier::OutputPolicy;
use crate::pipelines::vdjc::collaborators::PairedMode;
use crate::pipelines::vdjc::dispatch::DispatchConfig;
use crate::pipelines::vdjc::parameters::{parse_override, AlignerParameters};
use crate::pipelines::vdjc::registration::ExclusionWarnings;
use clap::Args;
use std::path::{Path, PathBuf};

// vdjc-align/src/pipelines/vdjc/options.rs
//
// Command-line surface of the align action. A host binary flattens
// `AlignOptions` into its own subcommand.

#[derive(Debug, Clone, Args)]
pub struct AlignOptions {
    /// input_file1 [input_file2] output_file ("." for no alignment output)
    #[arg(value_name = "FILES", required = true, num_args = 2..=3)]
    pub files: Vec<PathBuf>,

    // ===== Parameters =====
    /// Override aligner parameters, e.g. -OvParameters.geneFeatureToAlign=VRegion
    #[arg(short = 'O', value_name = "KEY=VALUE")]
    pub overrides: Vec<String>,

    /// Aligner parameters preset
    #[arg(short = 'p', long = "parameters", value_name = "NAME", default_value = defaults::PARAMETERS_PRESET)]
    pub preset: String,

    /// Segments library for alignment
    #[arg(short = 'b', long, value_name = "NAME", default_value = defaults::LIBRARY)]
    pub library: String,

    /// Species (organism), as specified in the library file or taxon id
    #[arg(short = 's', long, value_name = "NAME", default_value = defaults::SPECIES)]
    pub species: String,

    /// Immunological chains to align, comma separated (IGH,TRB,...), TCR, IG or ALL
    #[arg(short = 'c', long, value_name = "CHAINS", default_value = defaults::CHAINS)]
    pub chains: String,

    /// Allow alignments with different chains of V and J hits
    #[arg(short = 'i', long = "diff-loci", hide = true)]
    pub diff_loci: bool,

    // ===== Processing =====
    /// Processing threads
    #[arg(short = 't', long, value_name = "INT", default_value_t = num_cpus::get())]
    pub threads: usize,

    /// Maximal number of reads to process
    #[arg(short = 'n', long, value_name = "INT")]
    pub limit: Option<u64>,

    /// Do not merge paired reads
    #[arg(short = 'd', long = "no-merge")]
    pub no_merge: bool,

    // ===== Output =====
    /// Copy read description lines to the alignment output
    #[arg(short = 'a', long)]
    pub save_description: bool,

    /// Write alignment results for all input reads (even if alignment has failed)
    #[arg(long)]
    pub write_all: bool,

    /// Copy original reads (sequences, qualities and descriptions) to the alignment output
    #[arg(short = 'g', long)]
    pub save_reads: bool,

    /// Write not aligned reads (R1)
    #[arg(long = "not-aligned-R1", value_name = "FILE")]
    pub not_aligned_r1: Option<PathBuf>,

    /// Write not aligned reads (R2)
    #[arg(long = "not-aligned-R2", value_name = "FILE")]
    pub not_aligned_r2: Option<PathBuf>,

    /// Report file (JSON)
    #[arg(short = 'r', long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    // ===== Warnings =====
    /// Print warnings for non-functional V/D/J/C genes
    #[arg(long = "non-functional-warnings")]
    pub non_functional_warnings: bool,

    /// Don't print warnings
    #[arg(long = "no-warnings")]
    pub no_warnings: bool,

    /// Verbose level: 1=error, 2=warning, 3=message, 4=debug, 5+=trace
    #[arg(long, value_name = "INT", default_value_t = defaults::VERBOSITY)]
    pub verbosity: i32,
}

impl AlignOptions {
    /// Options for the given input file(s) and output name, all other
    /// values at their defaults
    pub fn new(files: Vec<PathBuf>) -> Self {
        Self {
            files,
            overrides: Vec::new(),
            preset: defaults::PARAMETERS_PRESET.to_string(),
            library: defaults::LIBRARY.to_string(),
            species: defaults::SPECIES.to_string(),
            chains: defaults::CHAINS.to_string(),
            diff_loci: false,
            threads: num_cpus::get(),
            limit: None,
            no_merge: false,
            save_description: false,
            write_all: false,
            save_reads: false,
            not_aligned_r1: None,
            not_aligned_r2: None,
            report: None,
            non_functional_warnings: false,
            no_warnings: false,
            verbosity: defaults::VERBOSITY,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.files.len() > 3 {
            return Err(AlignError::invalid_options("Too many input files."));
        }
        if self.files.len() < 2 {
            return Err(AlignError::invalid_options("No output file."));
        }
        if self.not_aligned_r2.is_some() && self.not_aligned_r1.is_none() {
            return Err(AlignError::invalid_options(
                "--not-aligned-R2 requires --not-aligned-R1",
            ));
        }
        if self.not_aligned_r1.is_some() && self.not_aligned_r2.is_some() != self.is_input_paired() {
            return Err(AlignError::invalid_options(if self.is_input_paired() {
                "Option --not-aligned-R2 is not set."
            } else {
                "Option --not-aligned-R2 is only valid for paired-end input."
            }));
        }
        if self.threads == 0 {
            return Err(AlignError::invalid_options("Number of threads must be positive."));
        }
        if self.limit == Some(0) {
            return Err(AlignError::invalid_options("Read limit must be positive."));
        }
        self.chain_filter()?;
        Ok(())
    }

    pub fn is_input_paired(&self) -> bool {
        self.files.len() == 3
    }

    pub fn input_files(&self) -> &[PathBuf] {
        &self.files[..self.files.len().saturating_sub(1)]
    }

    pub fn output_name(&self) -> &Path {
        self.files.last().map_or(Path::new(defaults::NO_OUTPUT), PathBuf::as_path)
    }

    /// False when the output name is "."
    pub fn writes_output(&self) -> bool {
        self.output_name() != Path::new(defaults::NO_OUTPUT)
    }

    /// Input file names joined by ','
    pub fn input_for_report(&self) -> String {
        self.input_files()
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn chain_filter(&self) -> Result<Chains> {
        self.chains.parse().map_err(AlignError::InvalidOptions)
    }

    /// Preset, then `-O` overrides, then the deprecated `--diff-loci`
    pub fn aligner_parameters(&self) -> Result<AlignerParameters> {
        let mut parameters = AlignerParameters::preset(&self.preset)?;

        let overrides = self
            .overrides
            .iter()
            .map(|raw| parse_override(raw))
            .collect::<Result<Vec<_>>>()?;
        parameters.apply_overrides(overrides.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

        if self.diff_loci {
            log::warn!("Usage of --diff-loci is deprecated. Use -OallowChimeras=true instead.");
            parameters.allow_chimeras = true;
        }
        Ok(parameters)
    }

    pub fn paired_mode(&self) -> PairedMode {
        PairedMode {
            paired: self.is_input_paired(),
            merge: !self.no_merge,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            threads: self.threads,
            limit: self.limit,
            ..DispatchConfig::default()
        }
    }

    pub fn output_policy(&self) -> OutputPolicy {
        OutputPolicy {
            save_description: self.save_description,
            save_reads: self.save_reads,
            write_all: self.write_all,
        }
    }

    pub fn exclusion_warnings(&self) -> ExclusionWarnings {
        ExclusionWarnings {
            enabled: !self.no_warnings,
            non_functional: self.non_functional_warnings,
        }
    }
}
