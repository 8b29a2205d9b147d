//! The tiered constraint matcher.
//!
//! Build a hash index of the code side keyed by `(entity, field,
//! validation_type)` in O(m), then resolve each spec constraint in tiers,
//! first hit wins: EXACT → CATEGORY → FIELD → FUZZY → NONE. The fuzzy tier is
//! the only asynchronous step and is skipped entirely when no collaborator is
//! configured.
//!
//! Nested-loop comparison of the two sides is disallowed: the per-field
//! candidate lists consulted by CATEGORY/FIELD are bounded by the validation
//! vocabulary (the code side is merged, at most one entry per key), so the
//! whole synchronous portion is O(n + m).

use ahash::AHashMap;
use concord_ir::IrSnapshot;
use concord_normalize::{
    enforcement_marker_kind, CanonicalName, ConstraintKey, NormalizedConstraint, ValidationType,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::bounds::{equivalent_integer_bounds, parse_bound, NumericBound};
use crate::fuzzy::{DescriptorPair, SimilarityCache, SimilarityProvider};
use crate::{MatchResult, MatchTier};

// ============================================================================
// Configuration
// ============================================================================

/// Kinds of category-tier equivalence the table can express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryRuleKind {
    /// Strict vs non-strict integer bound equivalence: `>N` ≡ `≥N+1`.
    /// Applies only on integer fields.
    IntegerBoundEquivalence,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    pub spec_type: ValidationType,
    pub code_type: ValidationType,
    pub kind: CategoryRuleKind,
}

/// Known-equivalent validation type/value pairs for the CATEGORY tier.
///
/// The seed set below is a minimum, not a ceiling: domain-specific pairs are
/// added with [`CategoryEquivalenceTable::with_rule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryEquivalenceTable {
    pub rules: Vec<CategoryRule>,
}

impl Default for CategoryEquivalenceTable {
    fn default() -> Self {
        Self {
            rules: vec![CategoryRule {
                spec_type: ValidationType::Range,
                code_type: ValidationType::Range,
                kind: CategoryRuleKind::IntegerBoundEquivalence,
            }],
        }
    }
}

impl CategoryEquivalenceTable {
    pub fn with_rule(mut self, rule: CategoryRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Check whether `spec` and `code` are category-equivalent. Returns the
    /// rationale of the first rule that applies.
    fn equivalent(
        &self,
        spec: &NormalizedConstraint,
        code: &NormalizedConstraint,
        field_is_integer: bool,
    ) -> Option<String> {
        for rule in &self.rules {
            if rule.spec_type != spec.validation_type || rule.code_type != code.validation_type {
                continue;
            }
            match rule.kind {
                CategoryRuleKind::IntegerBoundEquivalence => {
                    if !field_is_integer {
                        continue;
                    }
                    let (Some(a), Some(b)) = (constraint_bound(spec), constraint_bound(code))
                    else {
                        continue;
                    };
                    if equivalent_integer_bounds(&a, &b) {
                        return Some(format!(
                            "integer bound equivalence: `{}` ≡ `{}`",
                            spec.provenance.descriptor, code.provenance.descriptor
                        ));
                    }
                }
            }
        }
        None
    }
}

fn constraint_bound(c: &NormalizedConstraint) -> Option<NumericBound> {
    if let Some(bound) = parse_bound(&c.provenance.descriptor) {
        return Some(bound);
    }
    match &c.value {
        Some(serde_json::Value::String(s)) => parse_bound(s),
        _ => None,
    }
}

/// Value compatibility for the EXACT tier. Sharing a canonical key is not
/// enough: `>0` and `ge=1` share `(entity, field, RANGE)` but are only
/// category-equivalent, so identical bounds (or identical values) are
/// required here and anything weaker falls through to CATEGORY.
fn values_compatible(spec: &NormalizedConstraint, code: &NormalizedConstraint) -> bool {
    match (constraint_bound(spec), constraint_bound(code)) {
        (Some(a), Some(b)) => a == b,
        (None, None) => match (&spec.value, &code.value) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        },
        _ => false,
    }
}

/// Matcher configuration. The fuzzy threshold and timeout govern the only
/// suspension point in the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatcherConfig {
    pub fuzzy_threshold: f64,
    pub fuzzy_timeout_ms: u64,
    pub fuzzy_batch_size: usize,
    pub equivalences: CategoryEquivalenceTable,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: 0.75,
            fuzzy_timeout_ms: 2_000,
            fuzzy_batch_size: 64,
            equivalences: CategoryEquivalenceTable::default(),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Per-run matcher statistics. `index_lookups` exists so tests can pin the
/// O(n + m) requirement to a number instead of a wall clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchStats {
    pub spec_count: usize,
    pub code_count: usize,
    pub index_lookups: u64,
    pub exact: usize,
    pub category: usize,
    pub field: usize,
    pub fuzzy: usize,
    pub missing: usize,
    pub fuzzy_cache_hits: u64,
    pub fuzzy_pairs_scored: u64,
    pub fuzzy_failures: u64,
}

/// Everything one match run produces: per-spec results in input order, the
/// unmatched code constraints, and the run statistics.
#[derive(Debug, Clone)]
pub struct MatchOutcome {
    pub results: Vec<MatchResult>,
    pub extra: Vec<NormalizedConstraint>,
    pub stats: MatchStats,
}

// ============================================================================
// Matcher
// ============================================================================

pub struct ConstraintMatcher {
    cfg: MatcherConfig,
}

impl ConstraintMatcher {
    pub fn new(cfg: MatcherConfig) -> Self {
        Self { cfg }
    }

    /// Batch-compare the spec side against the code side.
    ///
    /// `provider` is the optional external similarity collaborator; `cache`
    /// holds its results across batches and runs.
    pub async fn match_constraints(
        &self,
        spec: &[NormalizedConstraint],
        code: &[NormalizedConstraint],
        ir: &IrSnapshot,
        provider: Option<&dyn SimilarityProvider>,
        cache: &SimilarityCache,
    ) -> MatchOutcome {
        let mut stats = MatchStats {
            spec_count: spec.len(),
            code_count: code.len(),
            ..MatchStats::default()
        };

        // O(m): index the code side once.
        let mut exact_index: AHashMap<ConstraintKey, usize> = AHashMap::new();
        let mut field_index: AHashMap<(CanonicalName, CanonicalName), Vec<usize>> =
            AHashMap::new();
        let mut entity_index: AHashMap<CanonicalName, Vec<usize>> = AHashMap::new();
        for (ci, c) in code.iter().enumerate() {
            exact_index.entry(c.key()).or_insert(ci);
            field_index
                .entry((c.entity.clone(), c.field.clone()))
                .or_default()
                .push(ci);
            entity_index.entry(c.entity.clone()).or_default().push(ci);
        }

        let mut matched_code = vec![false; code.len()];
        let mut results: Vec<Option<MatchResult>> = vec![None; spec.len()];
        let mut fuzzy_pending: Vec<usize> = Vec::new();

        // Synchronous tiers: EXACT → CATEGORY → FIELD.
        for (si, s) in spec.iter().enumerate() {
            stats.index_lookups += 1;
            if let Some(&ci) = exact_index.get(&s.key()) {
                if values_compatible(s, &code[ci]) {
                    matched_code[ci] = true;
                    results[si] = Some(finalize(
                        s,
                        Some(&code[ci]),
                        MatchTier::Exact,
                        1.0,
                        format!("exact key match on {}", s.key()),
                    ));
                    continue;
                }
                // Same key, incompatible values: not EXACT. The candidate is
                // still reachable below through the (entity, field) index.
            }

            stats.index_lookups += 1;
            if let Some(candidates) = field_index.get(&(s.entity.clone(), s.field.clone())) {
                let field_is_integer = ir
                    .entity(s.entity.as_str())
                    .and_then(|e| e.field(s.field.as_str()))
                    .map(|f| f.is_integer())
                    .unwrap_or(false);

                // CATEGORY: known-equivalent type/value pair.
                let category = candidates.iter().find_map(|&ci| {
                    self.cfg
                        .equivalences
                        .equivalent(s, &code[ci], field_is_integer)
                        .map(|rationale| (ci, rationale))
                });
                if let Some((ci, rationale)) = category {
                    matched_code[ci] = true;
                    results[si] =
                        Some(finalize(s, Some(&code[ci]), MatchTier::Category, 0.9, rationale));
                    continue;
                }

                // FIELD: spec side is CUSTOM and the code side carries
                // recognized real-enforcement evidence.
                if s.validation_type == ValidationType::Custom {
                    let covered = candidates
                        .iter()
                        .find(|&&ci| code[ci].enforcement_type.is_mechanical())
                        .copied();
                    if let Some(ci) = covered {
                        let kind = enforcement_marker_kind(&code[ci].provenance.enforcement_hint)
                            .unwrap_or_else(|| code[ci].enforcement_type.as_str());
                        matched_code[ci] = true;
                        results[si] = Some(finalize(
                            s,
                            Some(&code[ci]),
                            MatchTier::Field,
                            0.7,
                            format!("field-level match: CUSTOM spec constraint covered by {kind} evidence"),
                        ));
                        continue;
                    }
                }
            }

            fuzzy_pending.push(si);
        }

        // FUZZY: delegated, batched, bounded; degrades to NONE.
        if !fuzzy_pending.is_empty() {
            if let Some(provider) = provider {
                self.resolve_fuzzy(
                    spec,
                    code,
                    &entity_index,
                    &fuzzy_pending,
                    provider,
                    cache,
                    &mut results,
                    &mut matched_code,
                    &mut stats,
                )
                .await;
            }
        }

        // Anything still unresolved is missing.
        let mut final_results = Vec::with_capacity(spec.len());
        for (si, slot) in results.into_iter().enumerate() {
            let result = slot.unwrap_or_else(|| MatchResult {
                spec: spec[si].clone(),
                code: None,
                tier: MatchTier::None,
                satisfied: false,
                confidence: 0.0,
                rationale: "no match at any tier".to_string(),
            });
            match result.tier {
                MatchTier::Exact => stats.exact += 1,
                MatchTier::Category => stats.category += 1,
                MatchTier::Field => stats.field += 1,
                MatchTier::Fuzzy => stats.fuzzy += 1,
                MatchTier::None => stats.missing += 1,
            }
            final_results.push(result);
        }

        let extra: Vec<NormalizedConstraint> = code
            .iter()
            .zip(&matched_code)
            .filter(|(_, matched)| !**matched)
            .map(|(c, _)| c.clone())
            .collect();

        debug!(
            spec = stats.spec_count,
            code = stats.code_count,
            exact = stats.exact,
            category = stats.category,
            field = stats.field,
            fuzzy = stats.fuzzy,
            missing = stats.missing,
            "match run complete"
        );

        MatchOutcome {
            results: final_results,
            extra,
            stats,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn resolve_fuzzy(
        &self,
        spec: &[NormalizedConstraint],
        code: &[NormalizedConstraint],
        entity_index: &AHashMap<CanonicalName, Vec<usize>>,
        pending: &[usize],
        provider: &dyn SimilarityProvider,
        cache: &SimilarityCache,
        results: &mut [Option<MatchResult>],
        matched_code: &mut [bool],
        stats: &mut MatchStats,
    ) {
        // Candidate pairs: spec item vs code items on the same entity.
        let mut requests: Vec<(usize, usize, DescriptorPair)> = Vec::new();
        for &si in pending {
            let s = &spec[si];
            let Some(candidates) = entity_index.get(&s.entity) else {
                continue;
            };
            for &ci in candidates {
                requests.push((
                    si,
                    ci,
                    DescriptorPair {
                        spec: s.describe(),
                        code: code[ci].describe(),
                    },
                ));
            }
        }

        // Resolve from cache first; only uncached pairs hit the collaborator.
        let mut scores: Vec<Option<f64>> = Vec::with_capacity(requests.len());
        let mut uncached: Vec<usize> = Vec::new();
        for (idx, (_, _, pair)) in requests.iter().enumerate() {
            match cache.get(pair) {
                Some(score) => {
                    stats.fuzzy_cache_hits += 1;
                    scores.push(Some(score));
                }
                None => {
                    scores.push(None);
                    uncached.push(idx);
                }
            }
        }

        let timeout = Duration::from_millis(self.cfg.fuzzy_timeout_ms);
        for chunk in uncached.chunks(self.cfg.fuzzy_batch_size.max(1)) {
            let pairs: Vec<DescriptorPair> =
                chunk.iter().map(|&idx| requests[idx].2.clone()).collect();

            match tokio::time::timeout(timeout, provider.score_batch(&pairs)).await {
                Ok(Ok(batch)) if batch.len() == pairs.len() => {
                    for (&idx, scored) in chunk.iter().zip(batch) {
                        cache.put(&requests[idx].2, scored.score);
                        scores[idx] = Some(scored.score);
                        stats.fuzzy_pairs_scored += 1;
                    }
                }
                Ok(Ok(batch)) => {
                    warn!(
                        provider = provider.name(),
                        expected = pairs.len(),
                        got = batch.len(),
                        "similarity batch misaligned; degrading to NONE"
                    );
                    stats.fuzzy_failures += 1;
                }
                Ok(Err(err)) => {
                    warn!(
                        provider = provider.name(),
                        error = %err,
                        "similarity batch failed; degrading to NONE"
                    );
                    stats.fuzzy_failures += 1;
                }
                Err(_) => {
                    warn!(
                        provider = provider.name(),
                        timeout_ms = self.cfg.fuzzy_timeout_ms,
                        "similarity batch timed out; degrading to NONE"
                    );
                    stats.fuzzy_failures += 1;
                }
            }
        }

        // Best accepted candidate per pending spec item, in request order for
        // deterministic tie-breaking (first candidate wins equal scores).
        let mut best: AHashMap<usize, (usize, f64)> = AHashMap::new();
        for (idx, (si, ci, _)) in requests.iter().enumerate() {
            let Some(score) = scores[idx] else { continue };
            if score < self.cfg.fuzzy_threshold {
                continue;
            }
            match best.get(si) {
                Some((_, current)) if score <= *current => {}
                _ => {
                    best.insert(*si, (*ci, score));
                }
            }
        }

        for &si in pending {
            if let Some(&(ci, score)) = best.get(&si) {
                matched_code[ci] = true;
                results[si] = Some(finalize(
                    &spec[si],
                    Some(&code[ci]),
                    MatchTier::Fuzzy,
                    score,
                    format!(
                        "semantic similarity {:.2} via {} provider",
                        score,
                        provider.name()
                    ),
                ));
            }
        }
    }
}

/// Apply the enforcement-compatibility rule and build the result.
///
/// A tier match against documentation-only code is not satisfaction: this
/// downgrade can turn an otherwise-EXACT key match into an unsatisfied
/// result, and that is the single most important business rule in the engine.
fn finalize(
    spec: &NormalizedConstraint,
    code: Option<&NormalizedConstraint>,
    tier: MatchTier,
    confidence: f64,
    rationale: String,
) -> MatchResult {
    let (satisfied, rationale) = match code {
        Some(c) => {
            if c.enforcement_type.is_mechanical() || !spec.enforcement_type.is_mechanical() {
                (true, rationale)
            } else {
                (
                    false,
                    format!(
                        "{rationale}; code side is DESCRIPTION (documented only), \
                         spec requires mechanical enforcement"
                    ),
                )
            }
        }
        None => (false, rationale),
    };

    MatchResult {
        spec: spec.clone(),
        code: code.cloned(),
        tier,
        satisfied,
        confidence,
        rationale,
    }
}
