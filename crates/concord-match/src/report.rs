//! Compliance aggregation: one pass over one match run.
//!
//! Both scoring modes are derived from the same `results[]`, never from
//! re-running the matcher, so different pipeline phases can never silently
//! disagree on the "same" compliance number. The report also always carries
//! `parse_errors` and `unresolved` next to the score: a perfect score must
//! never be reported while inputs were silently dropped.

use concord_normalize::NormalizedConstraint;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::matcher::{MatchOutcome, MatchStats};

/// Context the aggregator cannot compute from the match run itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportMeta {
    pub ir_digest: String,
    /// Structurally invalid extractor items skipped before normalization.
    pub parse_errors: usize,
    /// Raw constraints excluded for unresolved entity/field names.
    pub unresolved: usize,
    /// Caller-supplied timestamp; reproducible runs pin this.
    pub generated_at_unix_secs: u64,
}

/// The immutable output of one validation invocation. Serializable for audit
/// and for the downstream repair/learning consumers, which treat the
/// `missing`/`extra` lists as their own input contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReportV1 {
    pub version: String,
    pub generated_at_unix_secs: u64,
    pub ir_digest: String,
    /// EXACT/CATEGORY-tier satisfied matches over total spec constraints.
    pub overall_strict: f64,
    /// Additionally counts FIELD/FUZZY-tier satisfied matches.
    pub overall_relaxed: f64,
    /// Satisfied fraction per entity (relaxed counting), deterministic order.
    pub per_entity: BTreeMap<String, f64>,
    /// Satisfied fraction per validation type (relaxed counting).
    pub per_type: BTreeMap<String, f64>,
    /// Spec constraints without a satisfied match.
    pub missing: Vec<NormalizedConstraint>,
    /// Code constraints without a spec counterpart (informational).
    pub extra: Vec<NormalizedConstraint>,
    pub parse_errors: usize,
    pub unresolved: usize,
    pub total_spec_constraints: usize,
    /// Sentinel: there were no spec constraints to validate. Scores are 0.0
    /// by convention, not by division.
    pub nothing_to_validate: bool,
    pub stats: MatchStats,
}

impl ComplianceReportV1 {
    /// A report is clean when nothing was dropped on the way in and nothing
    /// is missing on the way out.
    pub fn is_clean(&self) -> bool {
        self.parse_errors == 0 && self.unresolved == 0 && self.missing.is_empty()
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Aggregate one match run into a compliance report, in a single pass.
pub fn aggregate(outcome: &MatchOutcome, meta: &ReportMeta) -> ComplianceReportV1 {
    let total = outcome.results.len();

    if total == 0 {
        // Nothing to validate: a sentinel report, never a division error.
        return ComplianceReportV1 {
            version: "1".to_string(),
            generated_at_unix_secs: meta.generated_at_unix_secs,
            ir_digest: meta.ir_digest.clone(),
            overall_strict: 0.0,
            overall_relaxed: 0.0,
            per_entity: BTreeMap::new(),
            per_type: BTreeMap::new(),
            missing: Vec::new(),
            extra: outcome.extra.clone(),
            parse_errors: meta.parse_errors,
            unresolved: meta.unresolved,
            total_spec_constraints: 0,
            nothing_to_validate: true,
            stats: outcome.stats,
        };
    }

    let mut strict = 0usize;
    let mut relaxed = 0usize;
    let mut missing = Vec::new();
    let mut entity_counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    let mut type_counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();

    for result in &outcome.results {
        let satisfied = result.satisfied;
        if satisfied {
            relaxed += 1;
            if result.tier.is_strict() {
                strict += 1;
            }
        } else {
            missing.push(result.spec.clone());
        }

        let entity = entity_counts
            .entry(result.spec.entity.to_string())
            .or_insert((0, 0));
        entity.0 += 1;
        if satisfied {
            entity.1 += 1;
        }

        let ty = type_counts
            .entry(result.spec.validation_type.as_str().to_string())
            .or_insert((0, 0));
        ty.0 += 1;
        if satisfied {
            ty.1 += 1;
        }
    }

    let fraction = |(total, satisfied): (usize, usize)| round4(satisfied as f64 / total as f64);

    ComplianceReportV1 {
        version: "1".to_string(),
        generated_at_unix_secs: meta.generated_at_unix_secs,
        ir_digest: meta.ir_digest.clone(),
        overall_strict: round4(strict as f64 / total as f64),
        overall_relaxed: round4(relaxed as f64 / total as f64),
        per_entity: entity_counts
            .into_iter()
            .map(|(k, v)| (k, fraction(v)))
            .collect(),
        per_type: type_counts
            .into_iter()
            .map(|(k, v)| (k, fraction(v)))
            .collect(),
        missing,
        extra: outcome.extra.clone(),
        parse_errors: meta.parse_errors,
        unresolved: meta.unresolved,
        total_spec_constraints: total,
        nothing_to_validate: false,
        stats: outcome.stats,
    }
}
