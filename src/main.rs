mod cli;
mod config;
mod db;
mod engine;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use engine::types::Strategy;

#[derive(Parser)]
#[command(name = "distill", version, about = "Deduplication and consolidation for AI agent memory stores")]
struct Cli {
    /// Path to config file (default: ~/.distill/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan for duplicate groups and write an analysis report (read-only)
    Analyze,
    /// Resolve duplicate groups with the configured strategy
    Resolve {
        /// Override the configured strategy: keep_latest, merge, or flag_only
        #[arg(long, value_parser = parse_strategy)]
        strategy: Option<Strategy>,
        /// Plan and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Consolidate repetitive checkpoint records into summaries
    Checkpoints {
        /// Plan and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Display record store statistics
    Stats,
}

fn parse_strategy(s: &str) -> Result<Strategy, String> {
    s.parse()
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::DistillConfig::load_from(path)?,
        None => config::DistillConfig::load()?,
    };

    // Initialize tracing with the configured log level, to stderr so stdout
    // stays clean for tables and piped report output.
    let filter =
        EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Analyze => cli::analyze::analyze(&config)?,
        Command::Resolve { strategy, dry_run } => {
            cli::resolve::resolve(&config, strategy, dry_run)?;
        }
        Command::Checkpoints { dry_run } => cli::checkpoints::checkpoints(&config, dry_run)?,
        Command::Stats => cli::stats::stats(&config)?,
    }

    Ok(())
}
