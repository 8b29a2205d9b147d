//! Command implementations: normalize / merge / validate / report show.
//!
//! Commands read JSON from disk, run the library pipeline, and write either
//! JSON (for tooling) or a colored text summary (for humans). Failure gating
//! is explicit: `validate` exits nonzero when the strict score falls below
//! `--fail-under`, unless `--no-fail` is set.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use concord_ir::IrSnapshot;
use concord_match::{
    ComplianceReportV1, ReportContainer, StubSimilarityProvider, ValidationPipeline,
};
use concord_normalize::{
    merge, normalize_batch, NormalizerConfig, RawConstraint, SourcePriorityTable,
};
use std::path::{Path, PathBuf};

use crate::render;

#[derive(Args, Debug, Clone)]
pub struct ValidateArgs {
    /// IR snapshot JSON
    #[arg(long)]
    pub ir: PathBuf,
    /// Specification-side raw constraints JSON
    #[arg(long)]
    pub spec: PathBuf,
    /// Code-side raw constraints JSON
    #[arg(long)]
    pub code: PathBuf,
    /// Write the report (JSON) here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Also persist the binary container (report + similarity cache)
    #[arg(long)]
    pub container: Option<PathBuf>,
    /// Warm the similarity cache from a previous container
    #[arg(long)]
    pub warm_from: Option<PathBuf>,
    /// Output format: text|json
    #[arg(long, default_value = "text")]
    pub format: String,
    /// Enable the local token-overlap similarity provider for the fuzzy tier
    #[arg(long)]
    pub fuzzy: bool,
    /// Fail (exit nonzero) when overall_strict is below this value
    #[arg(long, default_value_t = 1.0)]
    pub fail_under: f64,
    /// Never fail on the score; report only
    #[arg(long)]
    pub no_fail: bool,
}

fn load_ir(path: &Path) -> Result<IrSnapshot> {
    IrSnapshot::from_path(path).with_context(|| format!("loading IR snapshot {}", path.display()))
}

fn load_raws(path: &Path) -> Result<Vec<RawConstraint>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading raw constraints {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("parsing raw constraints {}", path.display()))
}

fn write_json<T: serde::Serialize>(value: &T, out: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

pub fn cmd_normalize(ir: &Path, input: &Path, out: Option<&Path>) -> Result<()> {
    let ir = load_ir(ir)?;
    let raws = load_raws(input)?;

    let outcome = normalize_batch(&raws, &ir, &NormalizerConfig::default());
    eprintln!(
        "normalized {} of {} ({} parse errors, {} unresolved)",
        outcome.normalized.len(),
        raws.len(),
        outcome.parse_errors(),
        outcome.unresolved()
    );
    write_json(&outcome.normalized, out)
}

pub fn cmd_merge(ir: &Path, input: &Path, out: Option<&Path>) -> Result<()> {
    let ir = load_ir(ir)?;
    let raws = load_raws(input)?;

    let outcome = normalize_batch(&raws, &ir, &NormalizerConfig::default());
    let parse_errors = outcome.parse_errors();
    let unresolved = outcome.unresolved();
    let merged = merge(outcome.normalized, &SourcePriorityTable::default());
    eprintln!(
        "merged to {} canonical constraints ({} parse errors, {} unresolved)",
        merged.len(),
        parse_errors,
        unresolved
    );
    write_json(&merged, out)
}

pub async fn cmd_validate(args: ValidateArgs) -> Result<()> {
    let ir = load_ir(&args.ir)?;
    let spec = load_raws(&args.spec)?;
    let code = load_raws(&args.code)?;

    let mut pipeline = ValidationPipeline::new(ir);
    if args.fuzzy {
        pipeline = pipeline.with_provider(Box::new(StubSimilarityProvider::new()));
    }
    if let Some(warm) = &args.warm_from {
        let container = ReportContainer::load(warm)
            .with_context(|| format!("loading container {}", warm.display()))?;
        container.restore_cache(pipeline.similarity_cache());
    }

    let report = pipeline.run(&spec, &code).await;

    match args.format.trim().to_ascii_lowercase().as_str() {
        "json" => write_json(&report, args.out.as_deref())?,
        "text" => {
            println!("{}", render::render_report(&report));
            if let Some(out) = &args.out {
                write_json(&report, Some(out))?;
            }
        }
        other => return Err(anyhow!("unknown --format `{other}` (expected text|json)")),
    }

    if let Some(path) = &args.container {
        ReportContainer::new(report.clone(), pipeline.similarity_cache())
            .save(path)
            .with_context(|| format!("writing container {}", path.display()))?;
    }

    if !args.no_fail && report.overall_strict < args.fail_under {
        return Err(anyhow!(
            "strict compliance {:.4} below --fail-under {:.4} ({} missing, {} parse errors, {} unresolved)",
            report.overall_strict,
            args.fail_under,
            report.missing.len(),
            report.parse_errors,
            report.unresolved
        ));
    }
    Ok(())
}

pub fn cmd_report_show(input: &Path) -> Result<()> {
    let report = load_report(input)?;
    println!("{}", render::render_report(&report));
    Ok(())
}

fn load_report(path: &Path) -> Result<ComplianceReportV1> {
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading report {}", path.display()))?;
        Ok(serde_json::from_str(&text)?)
    } else {
        Ok(ReportContainer::load(path)
            .with_context(|| format!("loading container {}", path.display()))?
            .report)
    }
}
