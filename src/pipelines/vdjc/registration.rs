// Gene registration and the fatal V/J precondition
//
// Every library gene carrying the feature-to-align of its type is added to
// the aligner. Excluded genes are reported with a capped warning: the first
// one individually, the rest as a single summary line.

use crate::core::types::{GeneRecord, GeneType};
use crate::error::{AlignError, Result};
use crate::pipelines::vdjc::collaborators::VdjcAligner;

/// Which excluded genes are worth a warning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExclusionWarnings {
    pub enabled: bool,
    /// Also warn about non-functional genes
    pub non_functional: bool,
}

impl Default for ExclusionWarnings {
    fn default() -> Self {
        Self {
            enabled: true,
            non_functional: false,
        }
    }
}

impl ExclusionWarnings {
    fn applies_to(&self, gene: &GeneRecord) -> bool {
        self.enabled && (gene.functional || self.non_functional)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationSummary {
    /// Registered genes in library order (written to the output header)
    pub registered: Vec<GeneRecord>,
    /// Genes lacking their feature-to-align
    pub excluded: usize,
    /// Of the excluded, non-functional ones
    pub excluded_non_functional: usize,
    /// Genes of a type the aligner is not configured for
    pub skipped: usize,
    /// Excluded genes that were reported as warnings
    pub warned: usize,
}

/// Register usable genes with `aligner`, then require at least one V and
/// one J gene.
///
/// # Arguments
/// * `aligner` - Engine built from the final (corrected) parameters
/// * `genes` - Filtered library genes
/// * `warnings` - Exclusion warning policy
/// Summary line for the excluded genes after the first warned one
fn more_excluded_message(count: usize) -> String {
    format!(
        "... {} more functional genes excluded due to absent \"featureToAlign\".",
        count
    )
}

pub fn register_genes<A: VdjcAligner + ?Sized>(
    aligner: &mut A,
    genes: Vec<GeneRecord>,
    warnings: ExclusionWarnings,
) -> Result<RegistrationSummary> {
    let mut summary = RegistrationSummary::default();

    for gene in genes {
        let Some(feature) = aligner.parameters().feature_to_align(gene.gene_type).cloned() else {
            log::debug!(
                "Gene {} skipped: {} genes are not aligned",
                gene.name,
                gene.gene_type
            );
            summary.skipped += 1;
            continue;
        };

        if gene.has_feature(&feature) {
            summary.registered.push(gene.clone());
            aligner.add_gene(gene);
            continue;
        }

        summary.excluded += 1;
        if !gene.functional {
            summary.excluded_non_functional += 1;
        }
        if warnings.applies_to(&gene) {
            if summary.warned == 0 {
                log::warn!(
                    "{} {} doesn't contain full {} (excluded)",
                    if gene.functional { "Functional gene" } else { "Gene" },
                    gene.name,
                    feature
                );
            }
            summary.warned += 1;
        }
    }

    if summary.warned > 1 {
        log::warn!("{}", more_excluded_message(summary.warned - 1));
    }
    if summary.excluded_non_functional > 0 {
        log::debug!(
            "{} non-functional genes excluded",
            summary.excluded_non_functional
        );
    }
    log::debug!(
        "Registered {} genes ({} V, {} J)",
        summary.registered.len(),
        aligner.v_genes_to_align(),
        aligner.j_genes_to_align()
    );

    if aligner.v_genes_to_align() == 0 {
        return Err(AlignError::NoUsableGenes {
            gene_type: GeneType::Variable,
        });
    }
    if aligner.j_genes_to_align() == 0 {
        return Err(AlignError::NoUsableGenes {
            gene_type: GeneType::Joining,
        });
    }
    Ok(summary)
}
