//! Integration tests for the complete Concord pipeline
//!
//! These tests verify end-to-end behavior across crates:
//! - IR snapshot → normalization → merge
//! - Tiered matching → aggregation
//! - Report persistence
//!
//! Run with: cargo test --test integration_tests

use concord_ir::{IrEntity, IrField, IrSnapshot};
use concord_match::{
    ComplianceReportV1, MatchTier, ReportContainer, StubSimilarityProvider, ValidationPipeline,
};
use concord_normalize::{
    merge, normalize_batch, NormalizerConfig, RawConstraint, SourceId, SourcePriorityTable,
};
use proptest::prelude::*;

// ============================================================================
// Fixtures
// ============================================================================

fn ir() -> IrSnapshot {
    IrSnapshot::from_entities(vec![
        IrEntity {
            name: "Product".to_string(),
            aliases: vec!["Item".to_string()],
            fields: vec![
                IrField {
                    name: "price".to_string(),
                    aliases: vec![],
                    field_type: Some("integer".to_string()),
                },
                IrField {
                    name: "stock_quantity".to_string(),
                    aliases: vec![],
                    field_type: Some("integer".to_string()),
                },
            ],
        },
        IrEntity {
            name: "Customer".to_string(),
            aliases: vec![],
            fields: vec![
                IrField {
                    name: "registration_date".to_string(),
                    aliases: vec![],
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
                name: "id".to_string(),
                aliases: vec![],
                field_type: Some("integer".to_string()),
            }],
        },
    ])
    .unwrap()
}

fn raw(entity: &str, field: &str, descriptor: &str, hint: &str, source: &str) -> RawConstraint {
    RawConstraint {
        entity: entity.to_string(),
        field: field.to_string(),
        descriptor: descriptor.to_string(),
        value: None,
        enforcement_hint: hint.to_string(),
        source: SourceId::new(source),
        location: None,
    }
}

async fn run(spec: &[RawConstraint], code: &[RawConstraint]) -> ComplianceReportV1 {
    ValidationPipeline::new(ir()).run_at(spec, code, 1_700_000_000).await
}

// ============================================================================
// Determinism
// ============================================================================

#[tokio::test]
async fn pipeline_is_deterministic_byte_for_byte() {
    let spec = vec![
        raw("Product", "price", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
        raw("Products", "stockQuantity", "ge=0", "validator", SourceId::BUSINESS_LOGIC),
        raw("Customer", "email", "email", "validator", SourceId::DECLARED_SCHEMA),
        raw("Order", "id", "unique", "database", SourceId::STRUCTURAL),
    ];
    let code = vec![
        raw("Product", "price", "ge=1", "ge=1", SourceId::STRUCTURAL),
        raw("Customer", "email", "email", "@field_validator", SourceId::STRUCTURAL),
    ];

    let a = run(&spec, &code).await;
    let b = run(&spec, &code).await;
    assert_eq!(
        serde_json::to_vec(&a).unwrap(),
        serde_json::to_vec(&b).unwrap()
    );
}

// ============================================================================
// Merge properties
// ============================================================================

#[test]
fn merge_is_idempotent_and_keys_are_unique() {
    let raws = vec![
        raw("Order", "id", "unique", "database", SourceId::BUSINESS_LOGIC),
        raw("Order", "id", "unique", "database", SourceId::STRUCTURAL),
        raw("Order", "id", "unique", "database", SourceId::DECLARED_SCHEMA),
        raw("Product", "price", "gt=0", "validator", SourceId::STRUCTURAL),
    ];
    let outcome = normalize_batch(&raws, &ir(), &NormalizerConfig::default());
    let table = SourcePriorityTable::default();

    let once = merge(outcome.normalized.clone(), &table);
    let twice = merge(once.clone(), &table);
    assert_eq!(once, twice);

    let mut keys: Vec<String> = once.iter().map(|c| c.key().to_string()).collect();
    let total = keys.len();
    keys.sort();
    keys.dedup();
    assert_eq!(keys.len(), total);
}

#[test]
fn merge_priority_beats_confidence() {
    // business-logic first (and with the better confidence, since structural
    // here goes through the alias and inference penalties): the structural
    // entry must still win.
    let raws = vec![
        raw("Order", "id", "UNIQUENESS", "database", SourceId::BUSINESS_LOGIC),
        raw("Orders", "id", "must be unique", "database", SourceId::STRUCTURAL),
    ];
    let outcome = normalize_batch(&raws, &ir(), &NormalizerConfig::default());
    assert!(outcome.normalized[0].confidence > outcome.normalized[1].confidence);

    let merged = merge(outcome.normalized, &SourcePriorityTable::default());
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].source.as_str(), SourceId::STRUCTURAL);
    assert_eq!(merged[0].merged_duplicates, 1);
}

// ============================================================================
// Enforcement rule (regression)
// ============================================================================

#[tokio::test]
async fn documented_immutability_is_matched_but_not_satisfied() {
    let spec = vec![raw(
        "Customer", "registration_date", "immutable", "immutable",
        SourceId::DECLARED_SCHEMA,
    )];
    let code = vec![raw(
        "Customer", "registration_date", "read-only", "description=read-only",
        SourceId::STRUCTURAL,
    )];

    let report = run(&spec, &code).await;
    assert_eq!(report.overall_strict, 0.0);
    assert_eq!(report.overall_relaxed, 0.0);
    assert_eq!(report.missing.len(), 1);
    assert_eq!(
        report.missing[0].field.as_str(),
        "registration_date"
    );

    // The tier is visible at the matcher level: matched, but unsatisfied.
    let outcome = normalize_batch(&spec, &ir(), &NormalizerConfig::default());
    let code_outcome = normalize_batch(&code, &ir(), &NormalizerConfig::default());
    let matcher = concord_match::ConstraintMatcher::new(Default::default());
    let matched = matcher
        .match_constraints(
            &outcome.normalized,
            &code_outcome.normalized,
            &ir(),
            None,
            &concord_match::SimilarityCache::new(),
        )
        .await;
    assert_ne!(matched.results[0].tier, MatchTier::None);
    assert!(!matched.results[0].satisfied);
}

// ============================================================================
// Category equivalence
// ============================================================================

#[tokio::test]
async fn strict_bound_matches_non_strict_bound_on_integer_field() {
    let spec = vec![raw("Product", "price", ">0", "validator", SourceId::DECLARED_SCHEMA)];
    let code = vec![raw("Product", "price", "ge=1", "ge=1", SourceId::STRUCTURAL)];

    let report = run(&spec, &code).await;
    // CATEGORY counts for both modes; FIELD/FUZZY would count only for
    // relaxed.
    assert_eq!(report.overall_strict, 1.0);
    assert_eq!(report.overall_relaxed, 1.0);

    let outcome = normalize_batch(&spec, &ir(), &NormalizerConfig::default());
    let code_outcome = normalize_batch(&code, &ir(), &NormalizerConfig::default());
    let matcher = concord_match::ConstraintMatcher::new(Default::default());
    let matched = matcher
        .match_constraints(
            &outcome.normalized,
            &code_outcome.normalized,
            &ir(),
            None,
            &concord_match::SimilarityCache::new(),
        )
        .await;
    assert_eq!(matched.results[0].tier, MatchTier::Category);
    assert_eq!(matched.results[0].confidence, 0.9);
    assert!(matched.results[0].satisfied);
}

// ============================================================================
// Scoring modes
// ============================================================================

#[tokio::test]
async fn field_tier_counts_only_for_relaxed() {
    // Spec side CUSTOM, code side carries real numeric-bound evidence on the
    // same (entity, field): FIELD tier.
    let spec = vec![raw(
        "Product", "price", "bespoke pricing invariant", "business_logic",
        SourceId::BUSINESS_LOGIC,
    )];
    let code = vec![raw("Product", "price", "ge=1", "ge=1", SourceId::STRUCTURAL)];

    let report = run(&spec, &code).await;
    assert_eq!(report.overall_strict, 0.0);
    assert_eq!(report.overall_relaxed, 1.0);
    assert!(report.missing.is_empty());
}

// ============================================================================
// Boundaries
// ============================================================================

#[tokio::test]
async fn empty_code_set_marks_everything_missing() {
    let spec = vec![
        raw("Product", "price", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
        raw("Order", "id", "unique", "database", SourceId::STRUCTURAL),
    ];

    let report = run(&spec, &[]).await;
    assert_eq!(report.overall_strict, 0.0);
    assert_eq!(report.overall_relaxed, 0.0);
    assert_eq!(report.missing.len(), 2);
    assert!(!report.nothing_to_validate);
}

#[tokio::test]
async fn empty_spec_set_yields_sentinel_not_a_division_error() {
    let code = vec![raw("Product", "price", "gt=0", "gt=0", SourceId::STRUCTURAL)];

    let report = run(&[], &code).await;
    assert!(report.nothing_to_validate);
    assert_eq!(report.total_spec_constraints, 0);
    assert_eq!(report.overall_strict, 0.0);
    assert_eq!(report.overall_relaxed, 0.0);
    assert_eq!(report.extra.len(), 1);
}

#[tokio::test]
async fn dropped_inputs_survive_to_the_report() {
    let spec = vec![
        raw("Product", "price", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
        raw("Nonexistent", "field", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
        raw("", "price", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
    ];
    let code = vec![raw("Product", "price", "gt=0", "gt=0", SourceId::STRUCTURAL)];

    let report = run(&spec, &code).await;
    // One valid spec constraint, fully satisfied, but the report must still
    // show what was dropped.
    assert_eq!(report.overall_strict, 1.0);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.parse_errors, 1);
    assert!(!report.is_clean());
}

// ============================================================================
// Performance ceiling
// ============================================================================

#[tokio::test]
async fn thousand_by_thousand_stays_linear() {
    let mut entities = Vec::new();
    let mut spec = Vec::new();
    let mut code = Vec::new();
    for i in 0..1_000 {
        entities.push(IrEntity {
            name: format!("Entity{i}"),
            aliases: vec![],
            fields: vec![IrField {
                name: "value".to_string(),
                aliases: vec![],
                field_type: Some("integer".to_string()),
            }],
        });
        spec.push(raw(&format!("Entity{i}"), "value", "gt=0", "validator", SourceId::DECLARED_SCHEMA));
        code.push(raw(&format!("Entity{i}"), "value", "gt=0", "gt=0", SourceId::STRUCTURAL));
    }
    let ir = IrSnapshot::from_entities(entities).unwrap();

    let spec_n = normalize_batch(&spec, &ir, &NormalizerConfig::default()).normalized;
    let code_n = normalize_batch(&code, &ir, &NormalizerConfig::default()).normalized;

    let matcher = concord_match::ConstraintMatcher::new(Default::default());
    let outcome = matcher
        .match_constraints(&spec_n, &code_n, &ir, None, &concord_match::SimilarityCache::new())
        .await;

    assert_eq!(outcome.stats.exact, 1_000);
    // The explicit ceiling: a small constant multiple of 1,000 index
    // lookups, guarding against a regression to O(n×m).
    assert!(
        outcome.stats.index_lookups <= 3_000,
        "index lookups {} exceeded the linear ceiling",
        outcome.stats.index_lookups
    );
}

// ============================================================================
// Fuzzy tier + persistence
// ============================================================================

#[tokio::test]
async fn fuzzy_results_persist_across_runs_via_container() {
    let spec = vec![raw(
        "Product", "price", "price positive nonzero amount", "validator",
        SourceId::DECLARED_SCHEMA,
    )];
    let code = vec![raw(
        "Product", "stock_quantity", "price positive nonzero amount", "gt=0",
        SourceId::STRUCTURAL,
    )];

    let pipeline = ValidationPipeline::new(ir())
        .with_provider(Box::new(StubSimilarityProvider::new()));
    let report = pipeline.run_at(&spec, &code, 1_700_000_000).await;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.cnrc");
    ReportContainer::new(report, pipeline.similarity_cache())
        .save(&path)
        .unwrap();

    // A fresh pipeline warmed from the container never re-issues the same
    // comparisons.
    let warmed = ValidationPipeline::new(ir())
        .with_provider(Box::new(StubSimilarityProvider::new()));
    ReportContainer::load(&path)
        .unwrap()
        .restore_cache(warmed.similarity_cache());
    assert!(!warmed.similarity_cache().is_empty());
}

// ============================================================================
// Property-based determinism
// ============================================================================

fn arb_source() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just(SourceId::STRUCTURAL),
        Just(SourceId::DECLARED_SCHEMA),
        Just(SourceId::BUSINESS_LOGIC),
        Just("unregistered"),
    ]
}

fn arb_raw() -> impl Strategy<Value = RawConstraint> {
    (
        prop_oneof![Just("Product"), Just("product"), Just("Item"), Just("Ghost")],
        prop_oneof![Just("price"), Just("stock_quantity"), Just("stockQuantity")],
        prop_oneof![Just("gt=0"), Just("ge=1"), Just("unique"), Just("required")],
        prop_oneof![Just("validator"), Just("description"), Just("gt=0")],
        arb_source(),
    )
        .prop_map(|(e, f, d, h, s)| raw(e, f, d, h, s))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn normalize_then_merge_is_deterministic(raws in proptest::collection::vec(arb_raw(), 0..40)) {
        let cfg = NormalizerConfig::default();
        let table = SourcePriorityTable::default();

        let a = merge(normalize_batch(&raws, &ir(), &cfg).normalized, &table);
        let b = merge(normalize_batch(&raws, &ir(), &cfg).normalized, &table);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn merged_output_never_shares_keys(raws in proptest::collection::vec(arb_raw(), 0..40)) {
        let merged = merge(
            normalize_batch(&raws, &ir(), &NormalizerConfig::default()).normalized,
            &SourcePriorityTable::default(),
        );
        let mut keys: Vec<String> = merged.iter().map(|c| c.key().to_string()).collect();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
    }
}
