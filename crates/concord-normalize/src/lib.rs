//! Concord normalization: raw constraints → canonical constraints
//!
//! This crate turns raw constraints extracted from heterogeneous sources
//! (declared schemas, structural code patterns, business-logic inference)
//! into one canonical form that the matcher can compare:
//!
//! ```text
//! RawConstraint ──► resolve entity ──► resolve field ──► classify type
//!                        │                  │                 │
//!                   Unresolved?        Unresolved?       never fails
//!                        │                  │                 │
//!                        └── excluded, logged, batch continues
//!                                                             │
//!                                  map enforcement ──► coerce value
//!                                                             │
//!                                                  NormalizedConstraint
//! ```
//!
//! Canonical identity is `(entity, field, validation_type)`; the merger
//! collapses duplicates of that key with a fixed source-priority total order.
//! Nothing here is fatal: a bad raw constraint costs one excluded item and a
//! logged warning, never the batch.

pub mod cache;
pub mod classify;
pub mod enforcement;
pub mod merge;
pub mod normalize;
pub mod resolve;

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Core Types
// ============================================================================

/// Identifier of an extraction source, used for merge priority decisions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(pub String);

impl SourceId {
    /// Declared-type / contract-derived extraction (e.g. model definitions).
    pub const DECLARED_SCHEMA: &'static str = "declared-schema";
    /// Structural / code-pattern extraction (e.g. table DDL, decorators).
    pub const STRUCTURAL: &'static str = "structural";
    /// Inferred from business-logic text or behavior.
    pub const BUSINESS_LOGIC: &'static str = "business-logic";
    /// Anything untagged.
    pub const UNKNOWN: &'static str = "unknown";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved entity or field name guaranteed to exist in the IR snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalName(pub String);

impl CanonicalName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One constraint as emitted by an extraction pass.
///
/// This is the single tagged shape at the extraction boundary: extractors
/// that historically emitted "sometimes a list, sometimes a dict" must
/// produce exactly this, and nothing downstream branches on shape again.
/// Immutable; not persisted beyond a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawConstraint {
    pub entity: String,
    pub field: String,
    /// Free-form constraint descriptor, e.g. `"gt=0"`, `"unique"`, `"email"`.
    pub descriptor: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Raw enforcement evidence, e.g. `"validator"`, `"description"`.
    #[serde(default)]
    pub enforcement_hint: String,
    pub source: SourceId,
    /// Where the extractor found this, e.g. `"models.py:42"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl RawConstraint {
    /// Boundary validation: structurally invalid extractor output is skipped
    /// with a warning and counted in `parse_errors`, never normalized.
    pub fn validate(&self) -> Result<(), String> {
        if self.entity.trim().is_empty() {
            return Err("empty entity name".to_string());
        }
        if self.field.trim().is_empty() {
            return Err("empty field name".to_string());
        }
        if self.descriptor.trim().is_empty() {
            return Err("empty descriptor".to_string());
        }
        Ok(())
    }

    /// Stable identity of this raw constraint for cache keys.
    pub fn digest(&self) -> String {
        concord_ir::digest::raw_constraint_digest_v1(
            &self.entity,
            &self.field,
            &self.descriptor,
            self.source.as_str(),
        )
    }
}

/// Canonical validation-type vocabulary (closed).
///
/// `Custom` is the universal, never-failing fallback; `Custom` constraints
/// are reported separately because they rarely admit exact/category matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationType {
    Format,
    Range,
    Presence,
    Uniqueness,
    Relationship,
    StatusTransition,
    WorkflowConstraint,
    Custom,
}

impl ValidationType {
    pub const ALL: [ValidationType; 8] = [
        ValidationType::Format,
        ValidationType::Range,
        ValidationType::Presence,
        ValidationType::Uniqueness,
        ValidationType::Relationship,
        ValidationType::StatusTransition,
        ValidationType::WorkflowConstraint,
        ValidationType::Custom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationType::Format => "FORMAT",
            ValidationType::Range => "RANGE",
            ValidationType::Presence => "PRESENCE",
            ValidationType::Uniqueness => "UNIQUENESS",
            ValidationType::Relationship => "RELATIONSHIP",
            ValidationType::StatusTransition => "STATUS_TRANSITION",
            ValidationType::WorkflowConstraint => "WORKFLOW_CONSTRAINT",
            ValidationType::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for ValidationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical enforcement-kind vocabulary (closed).
///
/// `Description` is the flag value: the constraint is documented but not
/// mechanically enforced. A match against a `Description`-side code
/// constraint is never `satisfied` unless the spec side itself only asks for
/// documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnforcementType {
    Description,
    Validator,
    ComputedField,
    Immutable,
    StateMachine,
    BusinessLogic,
}

impl EnforcementType {
    /// Whether this kind is a mechanical guarantee rather than documentation.
    pub fn is_mechanical(&self) -> bool {
        !matches!(self, EnforcementType::Description)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EnforcementType::Description => "DESCRIPTION",
            EnforcementType::Validator => "VALIDATOR",
            EnforcementType::ComputedField => "COMPUTED_FIELD",
            EnforcementType::Immutable => "IMMUTABLE",
            EnforcementType::StateMachine => "STATE_MACHINE",
            EnforcementType::BusinessLogic => "BUSINESS_LOGIC",
        }
    }
}

impl fmt::Display for EnforcementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical identity used for both dedup and matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConstraintKey {
    pub entity: CanonicalName,
    pub field: CanonicalName,
    pub validation_type: ValidationType,
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.entity, self.field, self.validation_type
        )
    }
}

/// A constraint in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedConstraint {
    pub entity: CanonicalName,
    pub field: CanonicalName,
    pub validation_type: ValidationType,
    pub enforcement_type: EnforcementType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    /// Resolution confidence in [0, 1], rounded to two decimals.
    pub confidence: f64,
    pub source: SourceId,
    /// The raw constraint this was normalized from, kept for audit.
    pub provenance: RawConstraint,
    /// How many duplicates the merger collapsed into this entry.
    #[serde(default)]
    pub merged_duplicates: u32,
}

impl NormalizedConstraint {
    pub fn key(&self) -> ConstraintKey {
        ConstraintKey {
            entity: self.entity.clone(),
            field: self.field.clone(),
            validation_type: self.validation_type,
        }
    }

    /// Short human-readable description, used in match rationales and as the
    /// request text for the fuzzy similarity collaborator.
    pub fn describe(&self) -> String {
        format!(
            "{}.{} {} ({})",
            self.entity, self.field, self.provenance.descriptor, self.validation_type
        )
    }
}

// ============================================================================
// Re-exports
// ============================================================================

pub use cache::{CacheStats, NormalizationCache};
pub use classify::{classify, ClassifiedType, ClassifierExtensions};
pub use enforcement::{
    enforcement_marker_kind, is_real_enforcement, map_enforcement, map_enforcement_evidence,
};
pub use merge::{merge, SourcePriorityTable};
pub use normalize::{
    normalize, normalize_batch, BatchOutcome, NormalizeError, NormalizerConfig, PenaltyTable,
};
pub use resolve::{resolve_entity, resolve_field, Resolution, ResolutionRule};
