//! Gene features: named sub-regions of a reference gene used as alignment targets.
//!
//! A feature is an ordered list of regions, each spanning two reference points
//! (an anchor point plus a nucleotide offset). A region whose end precedes its
//! begin is *reversed*: it stands for the reverse complement of the germline
//! bases around an anchor, i.e. a palindromic (P) segment.
//!
//! Features are encoded by name (`VRegion`, `VRegionWithP`, ...) or, for
//! custom features, as `Begin(offset):End(offset)` regions joined by `+`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Maximal length of a germline P segment
pub const P_SEGMENT_LENGTH: i32 = 6;

/// Anchor points along a V(D)J(C) gene, in germline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnchorPoint {
    V5UTRBegin,
    L1Begin,
    L1End,
    L2Begin,
    FR1Begin,
    CDR3Begin,
    VEnd,
    DBegin,
    DEnd,
    JBegin,
    CDR3End,
    FR4End,
    CBegin,
    CExon1End,
    CEnd,
}

impl AnchorPoint {
    pub const ALL: [AnchorPoint; 15] = [
        AnchorPoint::V5UTRBegin,
        AnchorPoint::L1Begin,
        AnchorPoint::L1End,
        AnchorPoint::L2Begin,
        AnchorPoint::FR1Begin,
        AnchorPoint::CDR3Begin,
        AnchorPoint::VEnd,
        AnchorPoint::DBegin,
        AnchorPoint::DEnd,
        AnchorPoint::JBegin,
        AnchorPoint::CDR3End,
        AnchorPoint::FR4End,
        AnchorPoint::CBegin,
        AnchorPoint::CExon1End,
        AnchorPoint::CEnd,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AnchorPoint::V5UTRBegin => "V5UTRBegin",
            AnchorPoint::L1Begin => "L1Begin",
            AnchorPoint::L1End => "L1End",
            AnchorPoint::L2Begin => "L2Begin",
            AnchorPoint::FR1Begin => "FR1Begin",
            AnchorPoint::CDR3Begin => "CDR3Begin",
            AnchorPoint::VEnd => "VEnd",
            AnchorPoint::DBegin => "DBegin",
            AnchorPoint::DEnd => "DEnd",
            AnchorPoint::JBegin => "JBegin",
            AnchorPoint::CDR3End => "CDR3End",
            AnchorPoint::FR4End => "FR4End",
            AnchorPoint::CBegin => "CBegin",
            AnchorPoint::CExon1End => "CExon1End",
            AnchorPoint::CEnd => "CEnd",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// Anchor point shifted by a number of nucleotides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferencePoint {
    pub anchor: AnchorPoint,
    pub offset: i32,
}

impl ReferencePoint {
    pub const fn at(anchor: AnchorPoint) -> Self {
        Self { anchor, offset: 0 }
    }

    pub const fn shifted(anchor: AnchorPoint, offset: i32) -> Self {
        Self { anchor, offset }
    }

    fn encode(&self) -> String {
        if self.offset == 0 {
            self.anchor.name().to_string()
        } else {
            format!("{}({:+})", self.anchor.name(), self.offset)
        }
    }

    fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        match s.find('(') {
            None => AnchorPoint::from_name(s).map(Self::at),
            Some(open) => {
                let anchor = AnchorPoint::from_name(&s[..open])?;
                let offset = s[open + 1..].strip_suffix(')')?.parse::<i32>().ok()?;
                Some(Self::shifted(anchor, offset))
            }
        }
    }
}

/// One contiguous stretch of a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureRegion {
    pub begin: ReferencePoint,
    pub end: ReferencePoint,
}

impl FeatureRegion {
    pub const fn new(begin: ReferencePoint, end: ReferencePoint) -> Self {
        Self { begin, end }
    }

    /// End lies before begin in germline coordinates
    pub fn is_reversed(&self) -> bool {
        (self.end.anchor, self.end.offset) < (self.begin.anchor, self.begin.offset)
    }
}

/// Named or custom gene feature
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GeneFeature {
    regions: Vec<FeatureRegion>,
}

use AnchorPoint::*;

const fn span(begin: AnchorPoint, end: AnchorPoint) -> FeatureRegion {
    FeatureRegion::new(ReferencePoint::at(begin), ReferencePoint::at(end))
}

const V_P_SEGMENT: FeatureRegion = FeatureRegion::new(
    ReferencePoint::at(VEnd),
    ReferencePoint::shifted(VEnd, -P_SEGMENT_LENGTH),
);

const J_P_SEGMENT: FeatureRegion = FeatureRegion::new(
    ReferencePoint::shifted(JBegin, P_SEGMENT_LENGTH),
    ReferencePoint::at(JBegin),
);

/// Well-known features, name → regions
fn known_features() -> Vec<(&'static str, Vec<FeatureRegion>)> {
    vec![
        ("VRegion", GeneFeature::v_region().regions),
        ("VRegionWithP", GeneFeature::v_region_with_p().regions),
        (
            "VTranscript",
            vec![span(V5UTRBegin, L1End), span(L2Begin, VEnd)],
        ),
        (
            "VTranscriptWithout5UTR",
            vec![span(L1Begin, L1End), span(L2Begin, VEnd)],
        ),
        (
            "VTranscriptWithout5UTRWithP",
            GeneFeature::v_transcript_without_5utr_with_p().regions,
        ),
        ("DRegion", GeneFeature::d_region().regions),
        ("JRegion", vec![span(JBegin, FR4End)]),
        ("JRegionWithP", GeneFeature::j_region_with_p().regions),
        ("CExon1", GeneFeature::c_exon1().regions),
        ("CRegion", vec![span(CBegin, CEnd)]),
    ]
}

impl GeneFeature {
    pub fn new(regions: Vec<FeatureRegion>) -> Self {
        Self { regions }
    }

    pub fn v_region() -> Self {
        Self::new(vec![span(FR1Begin, VEnd)])
    }

    pub fn v_region_with_p() -> Self {
        Self::new(vec![span(FR1Begin, VEnd), V_P_SEGMENT])
    }

    pub fn v_transcript_without_5utr_with_p() -> Self {
        Self::new(vec![span(L1Begin, L1End), span(L2Begin, VEnd), V_P_SEGMENT])
    }

    pub fn d_region() -> Self {
        Self::new(vec![span(DBegin, DEnd)])
    }

    pub fn j_region_with_p() -> Self {
        Self::new(vec![J_P_SEGMENT, span(JBegin, FR4End)])
    }

    pub fn c_exon1() -> Self {
        Self::new(vec![span(CBegin, CExon1End)])
    }

    pub fn regions(&self) -> &[FeatureRegion] {
        &self.regions
    }

    /// Includes at least one reversed (P-segment) region
    pub fn has_reversed_regions(&self) -> bool {
        self.regions.iter().any(FeatureRegion::is_reversed)
    }

    /// Anchor points a gene must have annotated for this feature to be extractable
    pub fn anchors(&self) -> impl Iterator<Item = AnchorPoint> + '_ {
        self.regions
            .iter()
            .flat_map(|r| [r.begin.anchor, r.end.anchor])
    }

    /// Broader V feature to fall back on when this one is missing from most V genes
    pub fn v_fallback(&self) -> Self {
        if self.has_reversed_regions() {
            Self::v_region_with_p()
        } else {
            Self::v_region()
        }
    }

    /// Canonical name, or the region syntax for custom features
    pub fn encode(&self) -> String {
        if let Some((name, _)) = known_features()
            .into_iter()
            .find(|(_, regions)| *regions == self.regions)
        {
            return name.to_string();
        }
        self.regions
            .iter()
            .map(|r| format!("{}:{}", r.begin.encode(), r.end.encode()))
            .collect::<Vec<_>>()
            .join("+")
    }
}

/// Error returned when a feature string cannot be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGeneFeatureError(pub String);

impl fmt::Display for ParseGeneFeatureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown gene feature: {}", self.0)
    }
}

impl std::error::Error for ParseGeneFeatureError {}

impl FromStr for GeneFeature {
    type Err = ParseGeneFeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some((_, regions)) = known_features().into_iter().find(|(n, _)| *n == s) {
            return Ok(Self { regions });
        }

        let mut regions = Vec::new();
        for part in s.split('+') {
            let (begin, end) = part
                .split_once(':')
                .ok_or_else(|| ParseGeneFeatureError(s.to_string()))?;
            let begin =
                ReferencePoint::parse(begin).ok_or_else(|| ParseGeneFeatureError(s.to_string()))?;
            let end =
                ReferencePoint::parse(end).ok_or_else(|| ParseGeneFeatureError(s.to_string()))?;
            regions.push(FeatureRegion::new(begin, end));
        }
        Ok(Self { regions })
    }
}

impl TryFrom<String> for GeneFeature {
    type Error = ParseGeneFeatureError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GeneFeature> for String {
    fn from(feature: GeneFeature) -> Self {
        feature.encode()
    }
}

impl fmt::Display for GeneFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}
