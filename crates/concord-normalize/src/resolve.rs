//! Entity/field name resolution against the IR snapshot.
//!
//! Resolution is *predictable and auditable*: an ordered, non-overlapping
//! rule list, first match wins, and no open-ended fuzzy string distance.
//! Unresolved names are surfaced, not papered over; the historical defects in
//! this area came from over-eager implicit guessing.

use concord_ir::{IrEntity, IrSnapshot};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::CanonicalName;

/// Which rule produced a resolution. Later rules carry higher confidence
/// penalties in the normalizer's penalty table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    /// Rule 1: exact case-sensitive match.
    Exact,
    /// Rule 2: case-insensitive match.
    CaseInsensitive,
    /// Rule 3 (entities): plural/singular normalization.
    PluralSingular,
    /// Rule 3 (fields): snake_case ↔ camelCase conversion.
    CaseConversion,
    /// Rule 4: explicit alias-table lookup.
    Alias,
}

/// Outcome of a resolution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        name: CanonicalName,
        rule: ResolutionRule,
    },
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }

    fn resolved(name: &str, rule: ResolutionRule) -> Self {
        Resolution::Resolved {
            name: CanonicalName(name.to_string()),
            rule,
        }
    }
}

// ============================================================================
// Entity resolution
// ============================================================================

/// Resolve a raw entity name to its canonical IR spelling.
///
/// Ordered rules, first match wins:
/// 1. exact case-sensitive match,
/// 2. case-insensitive match,
/// 3. plural/singular normalization (strip trailing `s`, retry 1–2),
/// 4. explicit alias-table lookup.
pub fn resolve_entity(ir: &IrSnapshot, raw_name: &str) -> Resolution {
    if let Some(entity) = ir.entity(raw_name) {
        return Resolution::resolved(&entity.name, ResolutionRule::Exact);
    }

    if let Some(entity) = entity_ci(ir, raw_name) {
        return Resolution::resolved(&entity.name, ResolutionRule::CaseInsensitive);
    }

    if let Some(singular) = raw_name.strip_suffix('s').or_else(|| raw_name.strip_suffix('S')) {
        if !singular.is_empty() {
            if let Some(entity) = ir.entity(singular).or_else(|| entity_ci(ir, singular)) {
                return Resolution::resolved(&entity.name, ResolutionRule::PluralSingular);
            }
        }
    }

    if let Some(entity) = ir.entity_by_alias(raw_name) {
        return Resolution::resolved(&entity.name, ResolutionRule::Alias);
    }

    warn!(raw = raw_name, "unresolved entity name");
    Resolution::Unresolved
}

fn entity_ci<'a>(ir: &'a IrSnapshot, raw: &str) -> Option<&'a IrEntity> {
    ir.entities()
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(raw))
}

// ============================================================================
// Field resolution
// ============================================================================

/// Resolve a raw field name within an already-resolved entity.
///
/// Same four-rule shape as [`resolve_entity`], with rule 3 replaced by
/// snake_case ↔ camelCase conversion.
pub fn resolve_field(entity: &IrEntity, raw_field: &str) -> Resolution {
    if let Some(field) = entity.field(raw_field) {
        return Resolution::resolved(&field.name, ResolutionRule::Exact);
    }

    if let Some(field) = entity
        .fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(raw_field))
    {
        return Resolution::resolved(&field.name, ResolutionRule::CaseInsensitive);
    }

    for converted in [snake_to_camel(raw_field), camel_to_snake(raw_field)] {
        if converted != raw_field {
            if let Some(field) = entity.field(&converted) {
                return Resolution::resolved(&field.name, ResolutionRule::CaseConversion);
            }
        }
    }

    if let Some(field) = entity.field_by_alias(raw_field) {
        return Resolution::resolved(&field.name, ResolutionRule::Alias);
    }

    warn!(
        entity = entity.name.as_str(),
        raw = raw_field,
        "unresolved field name"
    );
    Resolution::Unresolved
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn camel_to_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_ir::{IrEntity, IrField, IrSnapshot};

    fn ir() -> IrSnapshot {
        IrSnapshot::from_entities(vec![
            IrEntity {
                name: "Customer".to_string(),
                aliases: vec!["Client".to_string()],
                fields: vec![
                    IrField {
                        name: "registration_date".to_string(),
                        aliases: vec!["signup_date".to_string()],
                        field_type: Some("date".to_string()),
                    },
                    IrField {
                        name: "email".to_string(),
                        aliases: vec![],
                        field_type: Some("string".to_string()),
                    },
                ],
            },
            IrEntity {
                name: "Order".to_string(),
                aliases: vec![],
                fields: vec![IrField {
                    name: "totalAmount".to_string(),
                    aliases: vec![],
                    field_type: Some("decimal".to_string()),
                }],
            },
        ])
        .unwrap()
    }

    #[test]
    fn entity_rules_fire_in_order() {
        let ir = ir();

        assert_eq!(
            resolve_entity(&ir, "Customer"),
            Resolution::Resolved {
                name: CanonicalName("Customer".to_string()),
                rule: ResolutionRule::Exact
            }
        );
        assert_eq!(
            resolve_entity(&ir, "customer"),
            Resolution::Resolved {
                name: CanonicalName("Customer".to_string()),
                rule: ResolutionRule::CaseInsensitive
            }
        );
        assert_eq!(
            resolve_entity(&ir, "Customers"),
            Resolution::Resolved {
                name: CanonicalName("Customer".to_string()),
                rule: ResolutionRule::PluralSingular
            }
        );
        assert_eq!(
            resolve_entity(&ir, "Client"),
            Resolution::Resolved {
                name: CanonicalName("Customer".to_string()),
                rule: ResolutionRule::Alias
            }
        );
        assert_eq!(resolve_entity(&ir, "Invoice"), Resolution::Unresolved);
    }

    #[test]
    fn field_case_conversion_both_directions() {
        let ir = ir();
        let customer = ir.entity("Customer").unwrap();
        let order = ir.entity("Order").unwrap();

        // camelCase raw against snake_case canonical
        assert_eq!(
            resolve_field(customer, "registrationDate"),
            Resolution::Resolved {
                name: CanonicalName("registration_date".to_string()),
                rule: ResolutionRule::CaseConversion
            }
        );
        // snake_case raw against camelCase canonical
        assert_eq!(
            resolve_field(order, "total_amount"),
            Resolution::Resolved {
                name: CanonicalName("totalAmount".to_string()),
                rule: ResolutionRule::CaseConversion
            }
        );
    }

    #[test]
    fn field_alias_lookup_is_last() {
        let ir = ir();
        let customer = ir.entity("Customer").unwrap();
        assert_eq!(
            resolve_field(customer, "signup_date"),
            Resolution::Resolved {
                name: CanonicalName("registration_date".to_string()),
                rule: ResolutionRule::Alias
            }
        );
        assert_eq!(resolve_field(customer, "phone"), Resolution::Unresolved);
    }

    #[test]
    fn case_helpers_round_trip() {
        assert_eq!(snake_to_camel("registration_date"), "registrationDate");
        assert_eq!(camel_to_snake("registrationDate"), "registration_date");
        assert_eq!(camel_to_snake("email"), "email");
    }
}
