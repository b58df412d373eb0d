// Tests for the setup phase: parameters, options, feature correction,
// gene registration, and the file-driven align action

mod common;

use common::{bare_v_gene, full_v_gene, j_gene, v_library, ScriptedAligner};
use std::io::Write;
use std::path::Path;
use vdjc_align::core::gene_feature::GeneFeature;
use vdjc_align::core::types::{Chain, Chains, GeneType};
use vdjc_align::error::AlignError;
use vdjc_align::pipelines::vdjc::registration::ExclusionWarnings;
use vdjc_align::pipelines::vdjc::{
    align_files, prepare, AlignOptions, AlignerParameters, InMemoryAlignmentWriter,
    InMemoryGeneLibrary, PairedMode, VdjcAligner,
};

fn prepare_with(library: &InMemoryGeneLibrary) -> vdjc_align::Result<vdjc_align::pipelines::vdjc::PreparedAligner<ScriptedAligner>> {
    prepare(
        AlignerParameters::default(),
        library,
        &Chains::all(),
        PairedMode::default(),
        ExclusionWarnings::default(),
        ScriptedAligner::new,
    )
}

fn write_fastq(path: &Path, prefix: &str, sequences: &[&str]) {
    let mut file = std::fs::File::create(path).unwrap();
    for (i, seq) in sequences.iter().enumerate() {
        writeln!(file, "@{}{}\n{}\n+\n{}", prefix, i, seq, "I".repeat(seq.len())).unwrap();
    }
}

#[test]
fn test_v_feature_corrected_when_most_genes_lack_it() {
    let library = InMemoryGeneLibrary::new("lib", v_library(40, 38, 32));
    let prepared = prepare_with(&library).unwrap();

    assert!(prepared.correction().applied);
    assert_eq!(
        prepared.parameters().v_parameters.gene_feature_to_align,
        GeneFeature::v_region_with_p()
    );
    // 32 FR1-annotated genes plus the 2 complete ones carry VRegionWithP
    assert_eq!(prepared.aligner().v_genes_to_align(), 34);
    assert_eq!(prepared.registration().excluded, 6);
}

#[test]
fn test_v_feature_kept_when_fallback_is_rare() {
    let library = InMemoryGeneLibrary::new("lib", v_library(40, 20, 20));
    let prepared = prepare_with(&library).unwrap();

    assert!(!prepared.correction().applied);
    assert_eq!(
        prepared.parameters().v_parameters.gene_feature_to_align,
        GeneFeature::v_transcript_without_5utr_with_p()
    );
    assert_eq!(prepared.aligner().v_genes_to_align(), 20);
    assert_eq!(prepared.aligner().j_genes_to_align(), 1);
}

#[test]
fn test_no_v_genes_is_fatal() {
    let library = InMemoryGeneLibrary::new(
        "lib",
        vec![bare_v_gene("TRBV1", Chain::TRB), j_gene("TRBJ1", Chain::TRB)],
    );
    let err = prepare_with(&library).err().unwrap();
    assert!(matches!(
        err,
        AlignError::NoUsableGenes {
            gene_type: GeneType::Variable
        }
    ));
}

#[test]
fn test_no_j_genes_fails_before_reading_input() {
    let library = InMemoryGeneLibrary::new("lib", vec![full_v_gene("TRBV1", Chain::TRB)]);
    let options = AlignOptions::new(vec![
        "/nonexistent/R1.fastq".into(),
        "/nonexistent/R2.fastq".into(),
        "out.vdjca".into(),
    ]);

    let err = align_files(
        &options,
        |_: &str, _: &str| Ok(&library),
        ScriptedAligner::new,
        None,
        "align",
    )
    .unwrap_err();
    assert!(matches!(
        err,
        AlignError::NoUsableGenes {
            gene_type: GeneType::Joining
        }
    ));
    assert!(err.to_string().starts_with("No J genes to align."));
}

#[test]
fn test_chain_filter_limits_registered_genes() {
    let mut genes = v_library(3, 0, 0);
    genes.push(full_v_gene("IGHV1", Chain::IGH));
    let library = InMemoryGeneLibrary::new("lib", genes);

    let prepared = prepare(
        AlignerParameters::default(),
        &library,
        &Chains::of(&[Chain::IGH]),
        PairedMode::default(),
        ExclusionWarnings::default(),
        ScriptedAligner::new,
    );
    // No IGH J gene in the library
    assert!(matches!(
        prepared.err().unwrap(),
        AlignError::NoUsableGenes {
            gene_type: GeneType::Joining
        }
    ));
}

#[test]
fn test_options_feed_parameters_and_policy() {
    let mut options = AlignOptions::new(vec!["R1.fq".into(), "R2.fq".into(), "out".into()]);
    options.preset = "rna-seq".to_string();
    options.overrides = vec![
        "vParameters.maxHits=2".to_string(),
        "readsLayout=Collinear".to_string(),
    ];
    options.diff_loci = true;
    options.no_merge = true;
    options.save_reads = true;
    options.limit = Some(10);
    options.threads = 3;

    options.validate().unwrap();
    let parameters = options.aligner_parameters().unwrap();
    assert!(parameters.allow_partial_alignments);
    assert!(parameters.allow_chimeras);
    assert_eq!(parameters.v_parameters.max_hits, 2);
    assert_eq!(
        parameters.reads_layout,
        vdjc_align::core::types::ReadsLayout::Collinear
    );

    let paired = options.paired_mode();
    assert!(paired.paired && !paired.merge);
    let config = options.dispatch_config();
    assert_eq!((config.threads, config.limit), (3, Some(10)));
    assert!(options.output_policy().save_reads);
    assert_eq!(options.input_for_report(), "R1.fq,R2.fq");
}

#[test]
fn test_bad_override_is_rejected() {
    let mut options = AlignOptions::new(vec!["R1.fq".into(), "out".into()]);
    options.overrides = vec!["vParameters.noSuchField=1".to_string()];
    assert!(matches!(
        options.aligner_parameters().unwrap_err(),
        AlignError::InvalidOverride { .. }
    ));

    options.overrides = vec!["missingEquals".to_string()];
    assert!(options.aligner_parameters().is_err());

    options.overrides.clear();
    options.preset = "no-such-preset".to_string();
    assert!(matches!(
        options.aligner_parameters().unwrap_err(),
        AlignError::UnknownPreset(_)
    ));
}

#[test]
fn test_paired_end_files_with_failed_sinks() {
    let dir = tempfile::tempdir().unwrap();
    let r1 = dir.path().join("R1.fastq");
    let r2 = dir.path().join("R2.fastq");
    let failed_r1 = dir.path().join("failed_R1.fastq");
    let failed_r2 = dir.path().join("failed_R2.fastq");
    write_fastq(&r1, "r", &["ACGT", "CCCC", "GGAA", "TTTT"]);
    write_fastq(&r2, "r", &["AAAA", "CCGG", "TTAA", "GCGC"]);

    let mut options = AlignOptions::new(vec![r1, r2, dir.path().join("out.vdjca")]);
    options.threads = 2;
    options.not_aligned_r1 = Some(failed_r1.clone());
    options.not_aligned_r2 = Some(failed_r2.clone());

    let library = InMemoryGeneLibrary::new("lib", v_library(2, 0, 0));
    let mut writer = InMemoryAlignmentWriter::default();
    let outcome = align_files(
        &options,
        |_: &str, _: &str| Ok(&library),
        |parameters, paired| {
            assert!(paired.paired);
            ScriptedAligner::new(parameters, paired).failing([1, 3])
        },
        Some(&mut writer),
        "align R1.fastq R2.fastq out.vdjca",
    )
    .unwrap();

    assert_eq!(
        writer.alignments.iter().map(|a| a.read_id).collect::<Vec<_>>(),
        vec![0, 2]
    );
    assert_eq!(writer.processed_reads, Some(4));
    assert_eq!(outcome.aligner_report().sunk, 2);
    assert_eq!(outcome.report.input_files, options.input_for_report());
    assert_eq!(outcome.report.library_id, "lib");

    let r1_text = std::fs::read_to_string(&failed_r1).unwrap();
    let r2_text = std::fs::read_to_string(&failed_r2).unwrap();
    assert_eq!(r1_text, "@r1\nCCCC\n+\nIIII\n@r3\nTTTT\n+\nIIII\n");
    assert_eq!(r2_text, "@r1\nCCGG\n+\nIIII\n@r3\nGCGC\n+\nIIII\n");
}

#[test]
fn test_single_end_with_r2_sink_is_rejected() {
    let mut options = AlignOptions::new(vec!["R1.fq".into(), "out".into()]);
    options.not_aligned_r1 = Some("f1.fq".into());
    options.not_aligned_r2 = Some("f2.fq".into());
    let library = InMemoryGeneLibrary::new("lib", v_library(2, 0, 0));

    let err = align_files(
        &options,
        |_: &str, _: &str| Ok(&library),
        ScriptedAligner::new,
        None,
        "align",
    )
    .unwrap_err();
    assert!(matches!(err, AlignError::InvalidOptions(_)));
}
