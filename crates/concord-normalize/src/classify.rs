//! Constraint-type classification: free-form descriptors → canonical vocabulary.
//!
//! Classification never fails; `CUSTOM` is the universal fallback. The
//! keyword groups are an explicit, ordered table rather than inline
//! conditionals, because scattered string heuristics were the historical
//! regression magnet here.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::ValidationType;

/// Outcome of classification: the type plus whether it was inferred from
/// keyword patterns (inference carries a confidence penalty downstream).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedType {
    pub validation_type: ValidationType,
    pub inferred: bool,
}

/// Configurable extension table, consulted after the built-in keyword groups.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierExtensions {
    /// Lowercased keyword → validation type, checked by substring.
    pub keywords: Vec<(String, ValidationType)>,
}

struct KeywordGroup {
    validation_type: ValidationType,
    patterns: Vec<Regex>,
}

struct ClassifierTable {
    groups: Vec<KeywordGroup>,
}

impl ClassifierTable {
    fn new() -> Self {
        fn group(validation_type: ValidationType, patterns: &[&str]) -> KeywordGroup {
            KeywordGroup {
                validation_type,
                patterns: patterns
                    .iter()
                    .map(|p| Regex::new(p).expect("static classifier pattern"))
                    .collect(),
            }
        }

        // Ordered: earlier groups win. Format before range so `email_max` style
        // descriptors still classify by their leading marker only when the
        // format marker is actually present.
        Self {
            groups: vec![
                group(
                    ValidationType::Format,
                    &[r"\bemail\b", r"\burl\b", r"\buuid\b", r"\bpattern\b", r"\bregex\b"],
                ),
                group(
                    ValidationType::Range,
                    &[
                        r"\bgt\b", r"\bge\b", r"\blt\b", r"\ble\b", r"\bmin\b", r"\bmax\b",
                        r"\bgreater\b", r"\bless\b", r"min_length", r"max_length",
                        r"[><]=?\s*-?\d",
                    ],
                ),
                group(
                    ValidationType::Uniqueness,
                    &[r"\bunique\b", r"primary[_\s]key", r"\bpk\b", r"\bduplicate\b"],
                ),
                group(
                    ValidationType::WorkflowConstraint,
                    &[r"\bexclude\b", r"\bread[-_\s]?only\b", r"\bimmutable\b", r"\bfrozen\b"],
                ),
                group(
                    ValidationType::Presence,
                    &[r"\brequired\b", r"not[_\s]null", r"\bmandatory\b", r"\bpresence\b"],
                ),
                group(
                    ValidationType::WorkflowConstraint,
                    &[r"\bcomputed\b", r"\bderived\b", r"\bgenerated\b", r"\bcalculated\b"],
                ),
                group(
                    ValidationType::Relationship,
                    &[r"foreign[_\s]key", r"\breferences\b", r"belongs[_\s]to", r"has[_\s]many"],
                ),
                group(
                    ValidationType::StatusTransition,
                    &[r"\btransition\b", r"state[_\s]machine", r"\bstatus\b"],
                ),
            ],
        }
    }
}

fn table() -> &'static ClassifierTable {
    static TABLE: OnceLock<ClassifierTable> = OnceLock::new();
    TABLE.get_or_init(ClassifierTable::new)
}

/// Map a free-form constraint descriptor to the canonical vocabulary.
///
/// Ordered: (1) exact case-insensitive vocabulary match, (2) keyword-group
/// matching, (3) extension table, (4) `CUSTOM` fallback. Never errors.
pub fn classify(descriptor: &str, extensions: &ClassifierExtensions) -> ClassifiedType {
    let normalized = descriptor
        .trim()
        .to_ascii_lowercase()
        .replace([' ', '-'], "_");

    // (1) exact vocabulary match
    for vt in ValidationType::ALL {
        if normalized == vt.as_str().to_ascii_lowercase() {
            return ClassifiedType {
                validation_type: vt,
                inferred: false,
            };
        }
    }

    // (2) ordered keyword groups
    let lowered = descriptor.to_ascii_lowercase();
    for group in &table().groups {
        if group.patterns.iter().any(|p| p.is_match(&lowered)) {
            return ClassifiedType {
                validation_type: group.validation_type,
                inferred: true,
            };
        }
    }

    // (3) configured extensions
    for (keyword, vt) in &extensions.keywords {
        if lowered.contains(keyword.as_str()) {
            return ClassifiedType {
                validation_type: *vt,
                inferred: true,
            };
        }
    }

    // (4) universal fallback
    ClassifiedType {
        validation_type: ValidationType::Custom,
        inferred: true,
    }
}
