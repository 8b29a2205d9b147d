//! Deduplication: collapse normalized constraints sharing a canonical key.
//!
//! Retention is decided by a **fixed, configuration-level total order over
//! sources**, not by comparing confidence scores at runtime. Confidence
//! tie-breaking was shown to be nondeterministic across otherwise-identical
//! runs; the priority table is the corrected design, kept as a tunable policy
//! rather than hard-coded branching.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{ConstraintKey, NormalizedConstraint, SourceId};

/// Fixed total order over sources. Earlier entries win merges; sources not
/// listed rank below everything listed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcePriorityTable {
    pub order: Vec<String>,
}

impl Default for SourcePriorityTable {
    fn default() -> Self {
        Self {
            order: vec![
                SourceId::STRUCTURAL.to_string(),
                SourceId::DECLARED_SCHEMA.to_string(),
                SourceId::BUSINESS_LOGIC.to_string(),
                SourceId::UNKNOWN.to_string(),
            ],
        }
    }
}

impl SourcePriorityTable {
    /// Rank of a source; lower ranks win. Unlisted sources rank last.
    pub fn priority(&self, source: &SourceId) -> usize {
        self.order
            .iter()
            .position(|s| s == source.as_str())
            .unwrap_or(self.order.len())
    }
}

/// Collapse duplicates by canonical key `(entity, field, validation_type)`.
///
/// - the retained entry per key is the highest-priority source,
/// - ties within the same source keep the first-seen entry (stable input
///   order),
/// - output preserves first-seen key order,
/// - the retained entry is annotated with the collapsed-duplicate count.
///
/// Idempotent: `merge(merge(x)) == merge(x)`.
pub fn merge(
    normalized: Vec<NormalizedConstraint>,
    table: &SourcePriorityTable,
) -> Vec<NormalizedConstraint> {
    let mut retained: Vec<NormalizedConstraint> = Vec::new();
    let mut by_key: AHashMap<ConstraintKey, usize> = AHashMap::new();
    let mut collapsed: Vec<u32> = Vec::new();

    for item in normalized {
        let key = item.key();
        match by_key.get(&key) {
            None => {
                by_key.insert(key, retained.len());
                collapsed.push(0);
                retained.push(item);
            }
            Some(&idx) => {
                collapsed[idx] += 1;
                let current = &retained[idx];
                if table.priority(&item.source) < table.priority(&current.source) {
                    debug!(
                        key = %key,
                        winner = item.source.as_str(),
                        loser = current.source.as_str(),
                        "merge: higher-priority source replaces retained entry"
                    );
                    retained[idx] = item;
                }
                // Same or lower priority: first-seen entry stays.
            }
        }
    }

    for (item, extra) in retained.iter_mut().zip(collapsed) {
        item.merged_duplicates += extra;
    }

    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CanonicalName, EnforcementType, RawConstraint, ValidationType};

    fn constraint(
        entity: &str,
        field: &str,
        vt: ValidationType,
        source: &str,
        confidence: f64,
    ) -> NormalizedConstraint {
        NormalizedConstraint {
            entity: CanonicalName(entity.to_string()),
            field: CanonicalName(field.to_string()),
            validation_type: vt,
            enforcement_type: EnforcementType::Validator,
            value: None,
            confidence,
            source: SourceId::new(source),
            provenance: RawConstraint {
                entity: entity.to_string(),
                field: field.to_string(),
                descriptor: "test".to_string(),
                value: None,
                enforcement_hint: "validator".to_string(),
                source: SourceId::new(source),
                location: None,
            },
            merged_duplicates: 0,
        }
    }

    #[test]
    fn priority_beats_confidence() {
        // business-logic arrives first with a *higher* confidence; the
        // structural entry must still win.
        let input = vec![
            constraint("Order", "id", ValidationType::Uniqueness, SourceId::BUSINESS_LOGIC, 0.99),
            constraint("Order", "id", ValidationType::Uniqueness, SourceId::STRUCTURAL, 0.40),
        ];

        let merged = merge(input, &SourcePriorityTable::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source.as_str(), SourceId::STRUCTURAL);
        assert_eq!(merged[0].merged_duplicates, 1);
    }

    #[test]
    fn same_source_ties_keep_first_seen() {
        let mut a = constraint("Order", "id", ValidationType::Uniqueness, SourceId::STRUCTURAL, 0.5);
        a.provenance.location = Some("first".to_string());
        let mut b = constraint("Order", "id", ValidationType::Uniqueness, SourceId::STRUCTURAL, 0.9);
        b.provenance.location = Some("second".to_string());

        let merged = merge(vec![a, b], &SourcePriorityTable::default());
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].provenance.location.as_deref(), Some("first"));
    }

    #[test]
    fn no_two_outputs_share_a_key() {
        let input = vec![
            constraint("A", "x", ValidationType::Range, SourceId::STRUCTURAL, 0.9),
            constraint("A", "x", ValidationType::Range, SourceId::DECLARED_SCHEMA, 0.9),
            constraint("A", "x", ValidationType::Presence, SourceId::STRUCTURAL, 0.9),
            constraint("B", "x", ValidationType::Range, SourceId::STRUCTURAL, 0.9),
        ];

        let merged = merge(input, &SourcePriorityTable::default());
        assert_eq!(merged.len(), 3);

        let mut keys: Vec<_> = merged.iter().map(|c| c.key()).collect();
        let before = keys.len();
        keys.sort_by(|a, b| format!("{a}").cmp(&format!("{b}")));
        keys.dedup();
        assert_eq!(keys.len(), before);
    }

    #[test]
    fn merge_is_idempotent() {
        let input = vec![
            constraint("A", "x", ValidationType::Range, SourceId::BUSINESS_LOGIC, 0.9),
            constraint("A", "x", ValidationType::Range, SourceId::STRUCTURAL, 0.5),
            constraint("B", "y", ValidationType::Presence, SourceId::UNKNOWN, 0.7),
        ];

        let table = SourcePriorityTable::default();
        let once = merge(input, &table);
        let twice = merge(once.clone(), &table);
        assert_eq!(once, twice);
    }

    #[test]
    fn unlisted_sources_rank_last() {
        let table = SourcePriorityTable::default();
        assert!(
            table.priority(&SourceId::new("homegrown")) > table.priority(&SourceId::new(SourceId::UNKNOWN))
        );
    }

    #[test]
    fn output_preserves_first_seen_key_order() {
        let input = vec![
            constraint("B", "y", ValidationType::Presence, SourceId::STRUCTURAL, 0.9),
            constraint("A", "x", ValidationType::Range, SourceId::STRUCTURAL, 0.9),
            constraint("B", "y", ValidationType::Presence, SourceId::DECLARED_SCHEMA, 0.9),
        ];

        let merged = merge(input, &SourcePriorityTable::default());
        assert_eq!(merged[0].entity.as_str(), "B");
        assert_eq!(merged[1].entity.as_str(), "A");
    }
}
