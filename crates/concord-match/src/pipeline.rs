//! Validation pipeline: normalize → merge → match → aggregate.
//!
//! The pipeline owns one IR snapshot and the configuration tables, runs the
//! four stages in order, and emits observability events to registered
//! handlers. It exists so callers get both scores, the missing/extra lists,
//! and the dropped-input counts from exactly one pass. The metric-drift
//! failure mode was different phases re-running pieces of this chain and
//! disagreeing on the "same" number.

use concord_ir::IrSnapshot;
use concord_normalize::{
    merge, normalize, BatchOutcome, NormalizationCache, NormalizerConfig, RawConstraint,
    SourcePriorityTable,
};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

use crate::fuzzy::{SimilarityCache, SimilarityProvider};
use crate::matcher::{ConstraintMatcher, MatcherConfig};
use crate::report::{aggregate, ComplianceReportV1, ReportMeta};

// ============================================================================
// Events
// ============================================================================

/// Events emitted as a validation run progresses.
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    RawIngested {
        spec: usize,
        code: usize,
    },
    Normalized {
        spec: usize,
        code: usize,
        parse_errors: usize,
        unresolved: usize,
    },
    Merged {
        spec: usize,
        code: usize,
    },
    Matched {
        matched: usize,
        missing: usize,
        extra: usize,
    },
    ReportReady {
        strict: f64,
        relaxed: f64,
    },
}

/// Callback for pipeline events.
pub type PipelineEventHandler = Box<dyn Fn(PipelineEvent) + Send + Sync>;

// ============================================================================
// Pipeline
// ============================================================================

pub struct ValidationPipeline {
    ir: IrSnapshot,
    normalizer_cfg: NormalizerConfig,
    priority_table: SourcePriorityTable,
    matcher_cfg: MatcherConfig,
    normalization_cache: NormalizationCache,
    similarity_cache: SimilarityCache,
    provider: Option<Box<dyn SimilarityProvider>>,
    event_handlers: Vec<PipelineEventHandler>,
}

impl ValidationPipeline {
    pub fn new(ir: IrSnapshot) -> Self {
        Self {
            ir,
            normalizer_cfg: NormalizerConfig::default(),
            priority_table: SourcePriorityTable::default(),
            matcher_cfg: MatcherConfig::default(),
            normalization_cache: NormalizationCache::new(),
            similarity_cache: SimilarityCache::new(),
            provider: None,
            event_handlers: Vec::new(),
        }
    }

    pub fn with_normalizer_config(mut self, cfg: NormalizerConfig) -> Self {
        self.normalizer_cfg = cfg;
        self
    }

    pub fn with_priority_table(mut self, table: SourcePriorityTable) -> Self {
        self.priority_table = table;
        self
    }

    pub fn with_matcher_config(mut self, cfg: MatcherConfig) -> Self {
        self.matcher_cfg = cfg;
        self
    }

    /// Attach the optional fuzzy similarity collaborator.
    pub fn with_provider(mut self, provider: Box<dyn SimilarityProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Add an event handler.
    pub fn on_event(&mut self, handler: PipelineEventHandler) {
        self.event_handlers.push(handler);
    }

    fn emit(&self, event: PipelineEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// The similarity cache, for persistence across runs.
    pub fn similarity_cache(&self) -> &SimilarityCache {
        &self.similarity_cache
    }

    pub fn ir(&self) -> &IrSnapshot {
        &self.ir
    }

    /// Run the full pipeline, stamping the report with the current time.
    pub async fn run(
        &self,
        spec_raws: &[RawConstraint],
        code_raws: &[RawConstraint],
    ) -> ComplianceReportV1 {
        self.run_at(spec_raws, code_raws, now_unix_secs()).await
    }

    /// Run the full pipeline with a pinned report timestamp. For fixed inputs
    /// and a fixed timestamp the serialized report is byte-identical across
    /// runs.
    pub async fn run_at(
        &self,
        spec_raws: &[RawConstraint],
        code_raws: &[RawConstraint],
        generated_at_unix_secs: u64,
    ) -> ComplianceReportV1 {
        self.emit(PipelineEvent::RawIngested {
            spec: spec_raws.len(),
            code: code_raws.len(),
        });
        // New raw constraints: fire the cache invalidation hook.
        self.normalization_cache.invalidate();

        // Step 1: normalize both sides; failures are isolated per item.
        let spec_batch = self.normalize_side(spec_raws);
        let code_batch = self.normalize_side(code_raws);
        let parse_errors = spec_batch.parse_errors() + code_batch.parse_errors();
        let unresolved = spec_batch.unresolved() + code_batch.unresolved();

        self.emit(PipelineEvent::Normalized {
            spec: spec_batch.normalized.len(),
            code: code_batch.normalized.len(),
            parse_errors,
            unresolved,
        });

        // Step 2: dedup with the fixed source-priority order.
        let spec = merge(spec_batch.normalized, &self.priority_table);
        let code = merge(code_batch.normalized, &self.priority_table);
        self.emit(PipelineEvent::Merged {
            spec: spec.len(),
            code: code.len(),
        });

        // Step 3: tiered match.
        let matcher = ConstraintMatcher::new(self.matcher_cfg.clone());
        let outcome = matcher
            .match_constraints(
                &spec,
                &code,
                &self.ir,
                self.provider.as_deref(),
                &self.similarity_cache,
            )
            .await;
        self.emit(PipelineEvent::Matched {
            matched: outcome.results.iter().filter(|r| r.satisfied).count(),
            missing: outcome.stats.missing,
            extra: outcome.extra.len(),
        });

        // Step 4: aggregate. Both scores come from this one pass.
        let report = aggregate(
            &outcome,
            &ReportMeta {
                ir_digest: self.ir.digest().to_string(),
                parse_errors,
                unresolved,
                generated_at_unix_secs,
            },
        );

        info!(
            strict = report.overall_strict,
            relaxed = report.overall_relaxed,
            missing = report.missing.len(),
            extra = report.extra.len(),
            parse_errors = report.parse_errors,
            unresolved = report.unresolved,
            "validation run complete"
        );
        self.emit(PipelineEvent::ReportReady {
            strict: report.overall_strict,
            relaxed: report.overall_relaxed,
        });

        report
    }

    /// Cache-aware equivalent of `normalize_batch`: entries are keyed by raw
    /// digest + IR digest, so reuse is only ever exact.
    fn normalize_side(&self, raws: &[RawConstraint]) -> BatchOutcome {
        let ir_digest = self.ir.digest().to_string();
        let mut outcome = BatchOutcome::default();

        for raw in raws {
            if let Some(cached) = self.normalization_cache.lookup(raw, &ir_digest) {
                outcome.normalized.push(cached);
                continue;
            }
            match normalize(raw, &self.ir, &self.normalizer_cfg) {
                Ok(normalized) => {
                    self.normalization_cache
                        .store(raw, &ir_digest, normalized.clone());
                    outcome.normalized.push(normalized);
                }
                Err(err) => outcome.errors.push(err),
            }
        }

        outcome
    }
}

fn now_unix_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use concord_ir::{IrEntity, IrField};
    use concord_normalize::SourceId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ir() -> IrSnapshot {
        IrSnapshot::from_entities(vec![IrEntity {
            name: "Product".to_string(),
            aliases: vec![],
            fields: vec![IrField {
                name: "price".to_string(),
                aliases: vec![],
                field_type: Some("integer".to_string()),
            }],
        }])
        .unwrap()
    }

    fn raw(descriptor: &str, hint: &str) -> RawConstraint {
        RawConstraint {
            entity: "Product".to_string(),
            field: "price".to_string(),
            descriptor: descriptor.to_string(),
            value: None,
            enforcement_hint: hint.to_string(),
            source: SourceId::new(SourceId::STRUCTURAL),
            location: None,
        }
    }

    #[tokio::test]
    async fn full_pipeline_produces_a_report() {
        let pipeline = ValidationPipeline::new(ir());
        let spec = vec![raw("gt=0", "validator")];
        let code = vec![raw("gt=0", "validator")];

        let report = pipeline.run_at(&spec, &code, 1_700_000_000).await;
        assert_eq!(report.overall_strict, 1.0);
        assert_eq!(report.overall_relaxed, 1.0);
        assert!(report.missing.is_empty());
        assert_eq!(report.ir_digest, pipeline.ir().digest());
    }

    #[tokio::test]
    async fn events_fire_in_order() {
        let mut pipeline = ValidationPipeline::new(ir());
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        pipeline.on_event(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let spec = vec![raw("gt=0", "validator")];
        pipeline.run_at(&spec, &[], 1_700_000_000).await;
        // RawIngested, Normalized, Merged, Matched, ReportReady.
        assert_eq!(seen.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn repeated_runs_are_byte_identical() {
        let pipeline = ValidationPipeline::new(ir());
        let spec = vec![raw("gt=0", "validator"), raw("unique", "database")];
        let code = vec![raw("ge=1", "ge=1")];

        let a = pipeline.run_at(&spec, &code, 1_700_000_000).await;
        let b = pipeline.run_at(&spec, &code, 1_700_000_000).await;
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
