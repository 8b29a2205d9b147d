//! Enforcement mapping and the real-vs-documentation judgment.
//!
//! `is_real_enforcement` is the direct, testable fix for the most damaging
//! defect class in this system's history: description strings being counted
//! as mechanical enforcement, silently corrupting every downstream metric and
//! repair decision. The default answer is **false**; only a fixed, ordered
//! marker table can flip it.

use regex::Regex;
use std::sync::OnceLock;

use crate::EnforcementType;

/// Map raw enforcement evidence to the canonical enforcement vocabulary.
///
/// Fixed vocabulary; anything else (including absence) is `DESCRIPTION`.
pub fn map_enforcement(hint: &str) -> EnforcementType {
    let normalized = hint.trim().to_ascii_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "validator" | "database" => EnforcementType::Validator,
        "computed" | "computed_field" => EnforcementType::ComputedField,
        "immutable" => EnforcementType::Immutable,
        "state_machine" => EnforcementType::StateMachine,
        "business_logic" => EnforcementType::BusinessLogic,
        _ => EnforcementType::Description,
    }
}

struct EnforcementMarker {
    kind: &'static str,
    pattern: Regex,
}

fn marker_table() -> &'static [EnforcementMarker] {
    static TABLE: OnceLock<Vec<EnforcementMarker>> = OnceLock::new();
    TABLE.get_or_init(|| {
        fn marker(kind: &'static str, pattern: &str) -> EnforcementMarker {
            EnforcementMarker {
                kind,
                pattern: Regex::new(pattern).expect("static enforcement pattern"),
            }
        }

        // Ordered: numeric bounds, immutability, computed, validator,
        // explicit business-logic evidence.
        vec![
            marker("numeric-bound", r"\b(gt|ge|lt|le)\s*="),
            marker("length-bound", r"\b(min_length|max_length)\s*="),
            marker("immutability", r"\bexclude\s*=\s*true\b"),
            marker("immutability", r"\bonupdate\s*=\s*none\b"),
            marker("computed", r"@computed_field\b"),
            marker("computed", r"@property\b"),
            marker("validator", r"@field_validator\b"),
            marker("validator", r"\bunique\s*=\s*true\b"),
            marker("validator", r"\bforeign\s+key\b"),
            marker("business-logic", r"\bstock\b.*\b(decrement|increment)"),
            marker("business-logic", r"\b(decrement|increment)\w*\b.*\bstock\b"),
        ]
    })
}

/// Decide whether code-side evidence is mechanical enforcement.
///
/// Defaults to `false` for any unrecognized string. Evidence that is, or
/// starts with, `description`/`description=` is never enforcement, no matter
/// what else the string contains.
pub fn is_real_enforcement(evidence: &str) -> bool {
    let lowered = evidence.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered.starts_with("description") {
        return false;
    }

    marker_table().iter().any(|m| m.pattern.is_match(&lowered))
}

/// Which marker kind matched, for rationale strings. `None` means the
/// evidence is documentation only.
pub fn enforcement_marker_kind(evidence: &str) -> Option<&'static str> {
    let lowered = evidence.trim().to_ascii_lowercase();
    if lowered.is_empty() || lowered.starts_with("description") {
        return None;
    }
    marker_table()
        .iter()
        .find(|m| m.pattern.is_match(&lowered))
        .map(|m| m.kind)
}

/// Map raw enforcement evidence to the canonical vocabulary.
///
/// Tries the fixed vocabulary first (extractors that already speak it), then
/// the marker table (extractors that hand over the evidence string itself,
/// e.g. `Field(ge=1)`). Unrecognized evidence is `DESCRIPTION`.
pub fn map_enforcement_evidence(hint: &str) -> EnforcementType {
    match map_enforcement(hint) {
        EnforcementType::Description => match enforcement_marker_kind(hint) {
            Some("numeric-bound") | Some("length-bound") | Some("validator") => {
                EnforcementType::Validator
            }
            Some("immutability") => EnforcementType::Immutable,
            Some("computed") => EnforcementType::ComputedField,
            Some("business-logic") => EnforcementType::BusinessLogic,
            _ => EnforcementType::Description,
        },
        mechanical => mechanical,
    }
}
