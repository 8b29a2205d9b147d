//! The constraint normalizer: five ordered steps with confidence scoring.
//!
//! Confidence starts at 1.0 and is reduced by a fixed penalty per non-exact
//! step taken, plus a source-reliability penalty. Both tables live in
//! [`NormalizerConfig`]: explicit, serde-loadable, testable tables, never inline
//! conditionals; most historical regressions traced to these being implicit
//! and duplicated across call sites.

use concord_ir::IrSnapshot;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::classify::{classify, ClassifierExtensions};
use crate::enforcement::map_enforcement_evidence;
use crate::resolve::{resolve_entity, resolve_field, Resolution, ResolutionRule};
use crate::{CanonicalName, NormalizedConstraint, RawConstraint, SourceId, ValidationType};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    #[error("unresolved entity `{entity}` (source: {source_id})")]
    UnresolvedEntity {
        entity: String,
        source_id: SourceId,
        raw: RawConstraint,
    },

    #[error("unresolved field `{field}` on entity `{entity}` (source: {source_id})")]
    UnresolvedField {
        entity: CanonicalName,
        field: String,
        source_id: SourceId,
        raw: RawConstraint,
    },

    #[error("malformed raw constraint: {reason}")]
    MalformedRawConstraint { reason: String, raw: RawConstraint },
}

impl NormalizeError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, NormalizeError::MalformedRawConstraint { .. })
    }

    pub fn is_unresolved(&self) -> bool {
        matches!(
            self,
            NormalizeError::UnresolvedEntity { .. } | NormalizeError::UnresolvedField { .. }
        )
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Fixed penalties per non-exact resolution step, in increasing severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyTable {
    pub case_variation: f64,
    pub case_conversion: f64,
    pub plural_singular: f64,
    pub alias_mapping: f64,
    pub pattern_inference: f64,
}

impl Default for PenaltyTable {
    fn default() -> Self {
        Self {
            case_variation: 0.05,
            case_conversion: 0.10,
            plural_singular: 0.15,
            alias_mapping: 0.20,
            pattern_inference: 0.25,
        }
    }
}

impl PenaltyTable {
    fn for_rule(&self, rule: ResolutionRule) -> f64 {
        match rule {
            ResolutionRule::Exact => 0.0,
            ResolutionRule::CaseInsensitive => self.case_variation,
            ResolutionRule::CaseConversion => self.case_conversion,
            ResolutionRule::PluralSingular => self.plural_singular,
            ResolutionRule::Alias => self.alias_mapping,
        }
    }
}

/// Normalizer configuration: penalty table, source-reliability penalties,
/// and classifier extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizerConfig {
    pub penalties: PenaltyTable,
    /// Source id → reliability penalty. Declared/structural sources are
    /// penalized least, inferred sources most.
    pub source_penalties: Vec<(String, f64)>,
    /// Penalty for sources not listed above.
    pub default_source_penalty: f64,
    pub extensions: ClassifierExtensions,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            penalties: PenaltyTable::default(),
            source_penalties: vec![
                (SourceId::STRUCTURAL.to_string(), 0.0),
                (SourceId::DECLARED_SCHEMA.to_string(), 0.05),
                (SourceId::BUSINESS_LOGIC.to_string(), 0.15),
                (SourceId::UNKNOWN.to_string(), 0.20),
            ],
            default_source_penalty: 0.20,
            extensions: ClassifierExtensions::default(),
        }
    }
}

impl NormalizerConfig {
    fn source_penalty(&self, source: &SourceId) -> f64 {
        self.source_penalties
            .iter()
            .find(|(id, _)| id == source.as_str())
            .map(|(_, p)| *p)
            .unwrap_or(self.default_source_penalty)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize one raw constraint. Five ordered steps:
/// 1. resolve entity (failure: `UnresolvedEntity`),
/// 2. resolve field within that entity (failure: `UnresolvedField`),
/// 3. classify validation type (never fails),
/// 4. map enforcement type (never fails),
/// 5. coerce the value per validation type.
pub fn normalize(
    raw: &RawConstraint,
    ir: &IrSnapshot,
    cfg: &NormalizerConfig,
) -> Result<NormalizedConstraint, NormalizeError> {
    if let Err(reason) = raw.validate() {
        return Err(NormalizeError::MalformedRawConstraint {
            reason,
            raw: raw.clone(),
        });
    }

    // (1) entity
    let (entity, entity_rule) = match resolve_entity(ir, &raw.entity) {
        Resolution::Resolved { name, rule } => (name, rule),
        Resolution::Unresolved => {
            return Err(NormalizeError::UnresolvedEntity {
                entity: raw.entity.clone(),
                source_id: raw.source.clone(),
                raw: raw.clone(),
            })
        }
    };

    // (2) field
    let ir_entity = ir
        .entity(entity.as_str())
        .expect("resolved entity exists in snapshot");
    let (field, field_rule) = match resolve_field(ir_entity, &raw.field) {
        Resolution::Resolved { name, rule } => (name, rule),
        Resolution::Unresolved => {
            return Err(NormalizeError::UnresolvedField {
                entity,
                field: raw.field.clone(),
                source_id: raw.source.clone(),
                raw: raw.clone(),
            })
        }
    };

    // (3) validation type, never fails
    let classified = classify(&raw.descriptor, &cfg.extensions);

    // (4) enforcement type, never fails
    let enforcement_type = map_enforcement_evidence(&raw.enforcement_hint);

    // (5) value coercion
    let value = coerce_value(classified.validation_type, &raw.descriptor, raw.value.clone());

    let mut confidence = 1.0;
    confidence -= cfg.penalties.for_rule(entity_rule);
    confidence -= cfg.penalties.for_rule(field_rule);
    if classified.inferred {
        confidence -= cfg.penalties.pattern_inference;
    }
    confidence -= cfg.source_penalty(&raw.source);
    let confidence = round2(confidence.max(0.0));

    debug!(
        entity = entity.as_str(),
        field = field.as_str(),
        validation_type = %classified.validation_type,
        confidence,
        "normalized constraint"
    );

    Ok(NormalizedConstraint {
        entity,
        field,
        validation_type: classified.validation_type,
        enforcement_type,
        value,
        confidence,
        source: raw.source.clone(),
        provenance: raw.clone(),
        merged_duplicates: 0,
    })
}

/// Outcome of a batch normalization: input order preserved, per-item failures
/// isolated: one bad raw constraint never aborts the batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    pub normalized: Vec<NormalizedConstraint>,
    pub errors: Vec<NormalizeError>,
}

impl BatchOutcome {
    /// Structurally invalid extractor items (surfaced as `parse_errors`).
    pub fn parse_errors(&self) -> usize {
        self.errors.iter().filter(|e| e.is_malformed()).count()
    }

    /// Unresolved entity/field items (surfaced next to the score).
    pub fn unresolved(&self) -> usize {
        self.errors.iter().filter(|e| e.is_unresolved()).count()
    }
}

/// Normalize a batch, preserving input order and isolating failures.
pub fn normalize_batch(
    raws: &[RawConstraint],
    ir: &IrSnapshot,
    cfg: &NormalizerConfig,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for raw in raws {
        match normalize(raw, ir, cfg) {
            Ok(normalized) => outcome.normalized.push(normalized),
            Err(err) => {
                warn!(error = %err, "excluding raw constraint from batch");
                outcome.errors.push(err);
            }
        }
    }

    outcome
}

// ============================================================================
// Value coercion
// ============================================================================

fn coerce_value(vt: ValidationType, descriptor: &str, value: Option<Value>) -> Option<Value> {
    let value = value?;
    if vt != ValidationType::Range {
        return Some(value);
    }

    let lowered = descriptor.to_ascii_lowercase();
    let wants_integer = lowered.contains("min_length") || lowered.contains("max_length");

    let coerced = match &value {
        Value::Number(n) => {
            if wants_integer {
                n.as_f64()
                    .map(|f| Value::Number(serde_json::Number::from(f.trunc() as i64)))
            } else {
                Some(value.clone())
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if wants_integer {
                trimmed
                    .parse::<i64>()
                    .ok()
                    .map(|i| Value::Number(serde_json::Number::from(i)))
            } else {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
            }
        }
        _ => None,
    };

    // Unparseable values pass through untouched; dropping data here would
    // hide extractor problems from the report.
    Some(coerced.unwrap_or(value))
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
