//! Tidemark: change-intelligence harness CLI.
//!
//! # Usage
//!
//! ```text
//! tidemark classify --change-type <type> --entity-type <type> [--source S] [--diff JSON] [--json]
//! tidemark rules [--json]
//! tidemark ingest <changes.jsonl> [--chain-store PATH] [--templates DIR] [--json]
//! tidemark --config tidemark.yaml <command>
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{classify::ClassifyArgs, ingest::IngestArgs, rules::RulesArgs};
use tidemark_core::{config, TidemarkConfig};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tidemark",
    version,
    about = "Classify, chain, and replay record change notifications",
    long_about = None,
)]
struct Cli {
    /// YAML configuration document (classifier thresholds, bus capacity).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify a single change and print the matched rule.
    Classify(ClassifyArgs),

    /// Print the severity decision table in precedence order.
    Rules(RulesArgs),

    /// Replay a JSONL file of changes through the ingestion pipeline.
    Ingest(IngestArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Commands::Classify(args) => args.run(&config),
        Commands::Rules(args) => args.run(),
        Commands::Ingest(args) => args.run(&config),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<TidemarkConfig> {
    match path {
        Some(path) => {
            let config = config::load_at(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?;
            tracing::debug!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        None => Ok(TidemarkConfig::default()),
    }
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    // stdout carries command output; diagnostics go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
