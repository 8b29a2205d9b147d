//! Human-readable report rendering.

use colored::Colorize;
use concord_match::ComplianceReportV1;

fn score_colored(score: f64) -> String {
    let text = format!("{:.1}%", score * 100.0);
    if score >= 0.95 {
        text.green().to_string()
    } else if score >= 0.75 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

pub fn render_report(report: &ComplianceReportV1) -> String {
    let mut out = String::new();

    out.push_str(&format!("{}\n", "Compliance Report".bold()));
    out.push_str(&format!("  ir: {}\n", report.ir_digest));

    if report.nothing_to_validate {
        out.push_str(&format!(
            "  {}\n",
            "nothing to validate (no spec constraints)".yellow()
        ));
    } else {
        out.push_str(&format!(
            "  strict:  {}   relaxed: {}   ({} spec constraints)\n",
            score_colored(report.overall_strict),
            score_colored(report.overall_relaxed),
            report.total_spec_constraints
        ));
    }

    // Dropped inputs are always surfaced: a perfect score with silently
    // excluded constraints is the failure mode this line exists to prevent.
    if report.parse_errors > 0 || report.unresolved > 0 {
        out.push_str(&format!(
            "  {} {} parse errors, {} unresolved names\n",
            "dropped inputs:".red().bold(),
            report.parse_errors,
            report.unresolved
        ));
    }

    if !report.per_entity.is_empty() {
        out.push_str("  per entity:\n");
        for (entity, score) in &report.per_entity {
            out.push_str(&format!("    {:30} {}\n", entity, score_colored(*score)));
        }
    }
    if !report.per_type.is_empty() {
        out.push_str("  per validation type:\n");
        for (ty, score) in &report.per_type {
            out.push_str(&format!("    {:30} {}\n", ty, score_colored(*score)));
        }
    }

    if !report.missing.is_empty() {
        out.push_str(&format!(
            "  {} ({}):\n",
            "missing enforcement".red().bold(),
            report.missing.len()
        ));
        for c in &report.missing {
            out.push_str(&format!(
                "    {}.{} [{}] {}\n",
                c.entity, c.field, c.validation_type, c.provenance.descriptor
            ));
        }
    }

    if !report.extra.is_empty() {
        out.push_str(&format!(
            "  extra (code-only, informational) ({}):\n",
            report.extra.len()
        ));
        for c in &report.extra {
            out.push_str(&format!(
                "    {}.{} [{}] {}\n",
                c.entity, c.field, c.validation_type, c.provenance.descriptor
            ));
        }
    }

    out
}
