// V feature-to-align correction
//
// Some libraries annotate only part of the V gene (no leader anchors), so
// almost no V gene carries the default feature. When that is the case and
// the shorter fallback is widely available, the fallback is aligned instead.
// The decision is taken once, before the aligner is built.

use crate::core::gene_feature::GeneFeature;
use crate::core::types::{GeneRecord, GeneType};
use crate::defaults::{V_FALLBACK_AVAILABLE_RATIO, V_FEATURE_MISSING_RATIO};
use crate::pipelines::vdjc::parameters::AlignerParameters;

/// Outcome of the V feature check
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureCorrection {
    /// V genes in the filtered library
    pub total_v: usize,
    /// V genes lacking the configured feature
    pub missing: usize,
    /// Of the missing, those carrying the fallback
    pub has_fallback: usize,
    pub original: GeneFeature,
    pub fallback: GeneFeature,
    pub applied: bool,
}

impl FeatureCorrection {
    /// Percentage of V genes lacking the configured feature
    pub fn missing_percent(&self) -> f64 {
        if self.total_v == 0 {
            0.0
        } else {
            100.0 * self.missing as f64 / self.total_v as f64
        }
    }
}

/// Count V genes lacking `feature` and decide whether to fall back.
///
/// # Arguments
/// * `feature` - V feature currently configured for alignment
/// * `genes` - Filtered library genes (any type; non-V genes are ignored)
pub fn evaluate_v_feature(feature: &GeneFeature, genes: &[GeneRecord]) -> FeatureCorrection {
    let fallback = feature.v_fallback();

    let mut total_v = 0;
    let mut missing = 0;
    let mut has_fallback = 0;
    for gene in genes.iter().filter(|g| g.gene_type == GeneType::Variable) {
        total_v += 1;
        if !gene.has_feature(feature) {
            missing += 1;
            if gene.has_feature(&fallback) {
                has_fallback += 1;
            }
        }
    }

    let applied = missing as f64 > V_FEATURE_MISSING_RATIO * total_v as f64
        && has_fallback as f64 > V_FALLBACK_AVAILABLE_RATIO * missing as f64;

    FeatureCorrection {
        total_v,
        missing,
        has_fallback,
        original: feature.clone(),
        fallback,
        applied,
    }
}

/// Apply the V feature check to `parameters`, replacing the V
/// feature-to-align when the fallback is chosen.
pub fn correct_v_feature(
    parameters: &mut AlignerParameters,
    genes: &[GeneRecord],
) -> FeatureCorrection {
    let correction = evaluate_v_feature(&parameters.v_parameters.gene_feature_to_align, genes);

    log::debug!(
        "V feature check: {} V genes, {} lack {}, {} of those have {}",
        correction.total_v,
        correction.missing,
        correction.original,
        correction.has_fallback,
        correction.fallback
    );

    if correction.applied {
        log::warn!(
            "Forcing vParameters.geneFeatureToAlign={} since {} is absent in {:.1}% of V genes",
            correction.fallback,
            correction.original,
            correction.missing_percent()
        );
        parameters.v_parameters.gene_feature_to_align = correction.fallback.clone();
    }
    correction
}
