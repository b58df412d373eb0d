// Aligner parameters, presets and `-O` overrides
//
// The parameter tree is serde-serializable with camelCase names, so an
// override such as `vParameters.geneFeatureToAlign=VRegion` is applied by
// editing the JSON value at that path and deserializing the result.

use crate::core::gene_feature::GeneFeature;
use crate::core::types::{GeneRecord, GeneType, ReadsLayout};
use crate::error::{AlignError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-gene-type alignment parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GeneAlignerParameters {
    pub gene_feature_to_align: GeneFeature,
    pub min_score: f32,
    pub relative_min_score: f32,
    pub max_hits: usize,
}

impl GeneAlignerParameters {
    fn new(feature: GeneFeature, min_score: f32, relative_min_score: f32, max_hits: usize) -> Self {
        Self {
            gene_feature_to_align: feature,
            min_score,
            relative_min_score,
            max_hits,
        }
    }
}

/// Parameters handed to the alignment engine
///
/// D and C alignment are optional; a gene type without parameters is not
/// aligned and its genes are never registered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AlignerParameters {
    pub v_parameters: GeneAlignerParameters,
    pub d_parameters: Option<GeneAlignerParameters>,
    pub j_parameters: GeneAlignerParameters,
    pub c_parameters: Option<GeneAlignerParameters>,
    pub allow_chimeras: bool,
    pub allow_partial_alignments: bool,
    pub reads_layout: ReadsLayout,
    pub min_sum_score: f32,
}

impl Default for AlignerParameters {
    fn default() -> Self {
        Self {
            v_parameters: GeneAlignerParameters::new(
                GeneFeature::v_transcript_without_5utr_with_p(),
                150.0,
                0.97,
                7,
            ),
            d_parameters: Some(GeneAlignerParameters::new(
                GeneFeature::d_region(),
                25.0,
                0.85,
                3,
            )),
            j_parameters: GeneAlignerParameters::new(GeneFeature::j_region_with_p(), 40.0, 0.97, 3),
            c_parameters: Some(GeneAlignerParameters::new(GeneFeature::c_exon1(), 40.0, 0.97, 3)),
            allow_chimeras: false,
            allow_partial_alignments: false,
            reads_layout: ReadsLayout::Opposite,
            min_sum_score: 120.0,
        }
    }
}

/// Names accepted by `AlignerParameters::preset`
pub const PRESET_NAMES: [&str; 2] = ["default", "rna-seq"];

impl AlignerParameters {
    /// Look up a named parameter preset
    pub fn preset(name: &str) -> Result<Self> {
        match name {
            "default" => Ok(Self::default()),
            "rna-seq" => Ok(Self {
                allow_partial_alignments: true,
                min_sum_score: 60.0,
                ..Self::default()
            }),
            other => Err(AlignError::UnknownPreset(other.to_string())),
        }
    }

    pub fn gene_aligner_parameters(&self, gene_type: GeneType) -> Option<&GeneAlignerParameters> {
        match gene_type {
            GeneType::Variable => Some(&self.v_parameters),
            GeneType::Diversity => self.d_parameters.as_ref(),
            GeneType::Joining => Some(&self.j_parameters),
            GeneType::Constant => self.c_parameters.as_ref(),
        }
    }

    pub fn feature_to_align(&self, gene_type: GeneType) -> Option<&GeneFeature> {
        self.gene_aligner_parameters(gene_type)
            .map(|p| &p.gene_feature_to_align)
    }

    /// Gene types the engine aligns, in V, D, J, C order
    pub fn configured_gene_types(&self) -> Vec<GeneType> {
        GeneType::ALL
            .into_iter()
            .filter(|gt| self.gene_aligner_parameters(*gt).is_some())
            .collect()
    }

    /// The gene carries the feature-to-align of its type
    pub fn contains_required_feature(&self, gene: &GeneRecord) -> bool {
        self.feature_to_align(gene.gene_type)
            .map_or(false, |f| gene.has_feature(f))
    }

    /// Apply `key=value` overrides in order.
    ///
    /// `value` is taken as JSON if it parses as JSON, otherwise as a string.
    pub fn apply_overrides<'a, I>(&mut self, overrides: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in overrides {
            let mut tree = serde_json::to_value(&*self)
                .map_err(|e| AlignError::invalid_override(key, e.to_string()))?;
            let slot = lookup_mut(&mut tree, key)?;
            *slot = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
            *self = serde_json::from_value(tree)
                .map_err(|e| AlignError::invalid_override(key, e.to_string()))?;
            log::debug!("Parameter override: {}={}", key, value);
        }
        Ok(())
    }
}

/// Resolve a dotted path to an existing JSON field
fn lookup_mut<'v>(tree: &'v mut Value, path: &str) -> Result<&'v mut Value> {
    let mut node = tree;
    for segment in path.split('.') {
        node = match node {
            Value::Object(map) => map
                .get_mut(segment)
                .ok_or_else(|| AlignError::invalid_override(path, format!("no such parameter '{}'", segment)))?,
            Value::Null => {
                return Err(AlignError::invalid_override(
                    path,
                    "parent parameter group is not set",
                ))
            }
            _ => {
                return Err(AlignError::invalid_override(
                    path,
                    format!("'{}' is not a parameter group", segment),
                ))
            }
        };
    }
    Ok(node)
}

/// Split `key=value` strings as given on the command line
pub fn parse_override(raw: &str) -> Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(AlignError::invalid_override(raw, "expected key=value")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gene_feature::AnchorPoint;
    use crate::core::types::{Chain, Partitioning};

    #[test]
    fn test_presets() {
        let default = AlignerParameters::preset("default").unwrap();
        assert_eq!(default, AlignerParameters::default());
        let rna = AlignerParameters::preset("rna-seq").unwrap();
        assert!(rna.allow_partial_alignments);
        assert!(matches!(
            AlignerParameters::preset("nope"),
            Err(AlignError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_override_feature_and_flags() {
        let mut params = AlignerParameters::default();
        params
            .apply_overrides([
                ("vParameters.geneFeatureToAlign", "VRegion"),
                ("allowChimeras", "true"),
                ("jParameters.maxHits", "5"),
                ("readsLayout", "Collinear"),
                ("cParameters", "null"),
            ])
            .unwrap();

        assert_eq!(params.v_parameters.gene_feature_to_align, GeneFeature::v_region());
        assert!(params.allow_chimeras);
        assert_eq!(params.j_parameters.max_hits, 5);
        assert_eq!(params.reads_layout, ReadsLayout::Collinear);
        assert_eq!(
            params.configured_gene_types(),
            vec![GeneType::Variable, GeneType::Diversity, GeneType::Joining]
        );
    }

    #[test]
    fn test_invalid_overrides() {
        let mut params = AlignerParameters::default();
        let err = params
            .apply_overrides([("vParameters.noSuchField", "1")])
            .unwrap_err();
        assert!(matches!(err, AlignError::InvalidOverride { .. }));

        assert!(params.apply_overrides([("allowChimeras", "maybe")]).is_err());
        assert!(params
            .apply_overrides([("vParameters.geneFeatureToAlign", "Nowhere")])
            .is_err());

        params.apply_overrides([("dParameters", "null")]).unwrap();
        assert!(params.apply_overrides([("dParameters.maxHits", "2")]).is_err());

        // Failed overrides leave earlier state intact
        assert_eq!(params.v_parameters, AlignerParameters::default().v_parameters);
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("allowChimeras=true").unwrap(),
            ("allowChimeras".to_string(), "true".to_string())
        );
        assert!(parse_override("allowChimeras").is_err());
        assert!(parse_override("=1").is_err());
    }

    #[test]
    fn test_contains_required_feature() {
        let params = AlignerParameters::default();
        let gene = |gene_type, anchors: &[AnchorPoint]| GeneRecord {
            name: "G".to_string(),
            gene_type,
            chain: Chain::IGH,
            functional: true,
            partitioning: Partitioning::new(anchors.iter().copied()),
        };

        let full_v = gene(
            GeneType::Variable,
            &[AnchorPoint::L1Begin, AnchorPoint::L1End, AnchorPoint::L2Begin, AnchorPoint::VEnd],
        );
        assert!(params.contains_required_feature(&full_v));

        let partial_v = gene(GeneType::Variable, &[AnchorPoint::FR1Begin, AnchorPoint::VEnd]);
        assert!(!params.contains_required_feature(&partial_v));

        let mut no_c = params.clone();
        no_c.c_parameters = None;
        let c = gene(GeneType::Constant, &[AnchorPoint::CBegin, AnchorPoint::CExon1End]);
        assert!(params.contains_required_feature(&c));
        assert!(!no_c.contains_required_feature(&c));
    }
}
