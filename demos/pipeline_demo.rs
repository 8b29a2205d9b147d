//! End-to-End Concord Demo
//!
//! Demonstrates the full pipeline:
//! 1. IR snapshot setup
//! 2. Raw constraint extraction (three sources)
//! 3. Normalize → merge → match → aggregate
//! 4. The description-vs-enforcement judgment

use concord_ir::{IrEntity, IrField, IrSnapshot};
use concord_match::ValidationPipeline;
use concord_normalize::{RawConstraint, SourceId};

fn raw(
    entity: &str,
    field: &str,
    descriptor: &str,
    hint: &str,
    source: &str,
) -> RawConstraint {
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

#[tokio::main]
async fn main() {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║           CONCORD END-TO-END DEMO                            ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    // ========================================================================
    // Step 1: IR snapshot
    // ========================================================================

    println!("━━━ Step 1: IR snapshot ━━━");
    println!();

    let ir = IrSnapshot::from_entities(vec![
        IrEntity {
            name: "Product".to_string(),
            aliases: vec![],
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
            fields: vec![IrField {
                name: "registration_date".to_string(),
                aliases: vec![],
                field_type: Some("date".to_string()),
            }],
        },
    ])
    .expect("demo snapshot is valid");

    println!("  Entities: Product, Customer");
    println!("  Snapshot digest: {}", ir.digest());
    println!();

    // ========================================================================
    // Step 2: Raw constraints from heterogeneous sources
    // ========================================================================

    println!("━━━ Step 2: Raw constraints ━━━");
    println!();

    let spec = vec![
        raw("Product", "price", "gt=0", "validator", SourceId::DECLARED_SCHEMA),
        raw("Products", "stockQuantity", "ge=0", "validator", SourceId::BUSINESS_LOGIC),
        raw("Customer", "registration_date", "immutable", "immutable", SourceId::DECLARED_SCHEMA),
    ];

    let code = vec![
        // Real enforcement: strict bound expressed non-strictly.
        raw("Product", "price", "ge=1", "ge=1", SourceId::STRUCTURAL),
        raw("Product", "stock_quantity", "ge=0", "ge=0", SourceId::STRUCTURAL),
        // The classic false positive: a read-only *docstring*.
        raw(
            "Customer",
            "registration_date",
            "read-only",
            "description=read-only after creation",
            SourceId::STRUCTURAL,
        ),
    ];

    println!("  Spec side: {} constraints", spec.len());
    println!("  Code side: {} constraints", code.len());
    println!();

    // ========================================================================
    // Step 3: Validate
    // ========================================================================

    println!("━━━ Step 3: normalize → merge → match → aggregate ━━━");
    println!();

    let pipeline = ValidationPipeline::new(ir);
    let report = pipeline.run(&spec, &code).await;

    println!("  strict:  {:.1}%", report.overall_strict * 100.0);
    println!("  relaxed: {:.1}%", report.overall_relaxed * 100.0);
    println!();

    // ========================================================================
    // Step 4: The judgment that matters
    // ========================================================================

    println!("━━━ Step 4: description is not enforcement ━━━");
    println!();
    for missing in &report.missing {
        println!(
            "  ✗ {}.{} [{}]: documented but not mechanically enforced",
            missing.entity, missing.field, missing.validation_type
        );
    }
    println!();
    println!("  Done.");
}
