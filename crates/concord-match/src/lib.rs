//! Concord matching: canonical spec constraints vs canonical code constraints
//!
//! ```text
//! spec[]──┐                       ┌──► MatchResult[] ──► ComplianceReport
//!         ├──► indexed matcher ───┤
//! code[]──┘    (EXACT → CATEGORY  └──► extra[] (informational)
//!               → FIELD → FUZZY)
//! ```
//!
//! The matcher is the one place in this system with a hard non-functional
//! requirement: O(n + m) via a hash index over the canonical key. The
//! quadratic alternative was a measured, order-of-magnitude failure (50+
//! minutes for what the index does in seconds), so nested-loop comparison is
//! out. [`matcher::MatchStats`] exposes the lookup count
//! so tests can hold the line.
//!
//! The single most important business rule lives here too: a tier match
//! against a code constraint whose enforcement is `DESCRIPTION` is **not
//! satisfied** (unless the spec side itself only asks for documentation).
//! Documentation is not enforcement.

pub mod bounds;
pub mod fuzzy;
pub mod matcher;
pub mod pipeline;
pub mod report;
pub mod report_format;

use concord_normalize::NormalizedConstraint;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Core Types
// ============================================================================

/// Which tier produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchTier {
    /// Same canonical key in the index.
    Exact,
    /// Same `(entity, field)`, known-equivalent validation types/values.
    Category,
    /// Same `(entity, field)`, spec side `CUSTOM`, code side carries real
    /// enforcement evidence.
    Field,
    /// Accepted by the external semantic-similarity collaborator.
    Fuzzy,
    /// No match at any tier; counted as missing.
    None,
}

impl MatchTier {
    /// Tiers counted by strict scoring.
    pub fn is_strict(&self) -> bool {
        matches!(self, MatchTier::Exact | MatchTier::Category)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::Exact => "EXACT",
            MatchTier::Category => "CATEGORY",
            MatchTier::Field => "FIELD",
            MatchTier::Fuzzy => "FUZZY",
            MatchTier::None => "NONE",
        }
    }
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of matching one spec constraint against the code side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub spec: NormalizedConstraint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<NormalizedConstraint>,
    pub tier: MatchTier,
    /// `false` whenever the matched code constraint is documentation-only and
    /// the spec constraint requires mechanical enforcement, regardless of
    /// tier.
    pub satisfied: bool,
    pub confidence: f64,
    pub rationale: String,
}

// ============================================================================
// Re-exports
// ============================================================================

pub use fuzzy::{
    DescriptorPair, SimilarityCache, SimilarityProvider, SimilarityScore, StubSimilarityProvider,
};
pub use matcher::{
    CategoryEquivalenceTable, CategoryRule, CategoryRuleKind, ConstraintMatcher, MatchOutcome,
    MatchStats, MatcherConfig,
};
pub use pipeline::{PipelineEvent, PipelineEventHandler, ValidationPipeline};
pub use report::{aggregate, ComplianceReportV1, ReportMeta};
pub use report_format::{ReportContainer, ReportFormatError};
