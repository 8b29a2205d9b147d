//! Concord CLI
//!
//! Unified command-line interface for:
//! - Normalizing raw constraint extracts against an IR snapshot
//! - Merging normalized constraints with the fixed source-priority order
//! - Validating generated code against a specification (full pipeline)
//! - Rendering saved compliance reports

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod render;
mod validate;

#[derive(Parser)]
#[command(name = "concord")]
#[command(
    author,
    version,
    about = "Concord: semantic constraint reconciliation engine"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize raw constraints against an IR snapshot.
    ///
    /// Unresolvable or malformed items are excluded and reported, never
    /// silently dropped.
    Normalize {
        #[command(flatten)]
        inputs: NormalizeArgs,
        /// Output JSON path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Normalize then deduplicate with the fixed source-priority order.
    Merge {
        #[command(flatten)]
        inputs: NormalizeArgs,
        /// Output JSON path (stdout if omitted)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Run the full pipeline: normalize → merge → match → aggregate.
    Validate(validate::ValidateArgs),

    /// Inspect saved compliance reports.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Args, Debug, Clone)]
struct NormalizeArgs {
    /// IR snapshot JSON
    #[arg(long)]
    ir: PathBuf,
    /// Raw constraints JSON (array of raw constraint objects)
    #[arg(long)]
    input: PathBuf,
}

#[derive(Subcommand)]
enum ReportCommands {
    /// Render a saved report (binary container or JSON) as text.
    Show {
        /// Report path (`.cnrc` container or `.json`)
        input: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Normalize { inputs, out } => validate::cmd_normalize(&inputs.ir, &inputs.input, out.as_deref()),
        Commands::Merge { inputs, out } => validate::cmd_merge(&inputs.ir, &inputs.input, out.as_deref()),
        Commands::Validate(args) => validate::cmd_validate(args).await,
        Commands::Report { command } => match command {
            ReportCommands::Show { input } => validate::cmd_report_show(&input),
        },
    }
}
