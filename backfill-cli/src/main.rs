//! Backfill CLI tool

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

#[derive(Parser)]
#[command(name = "backfill")]
#[command(author, version, about = "Asset backfill scheduler CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Asset graph definition (JSON)
    #[arg(long, env = "BACKFILL_GRAPH", global = true, default_value = "assets.json")]
    graph: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the target and first batch of run requests without running anything
    Plan {
        #[command(flatten)]
        selection: commands::SelectionArgs,

        /// Print run requests as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a backfill to completion with the local executor
    Run {
        #[command(flatten)]
        selection: commands::SelectionArgs,

        /// Backfill ID (default: generated)
        #[arg(long)]
        backfill_id: Option<String>,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Resume a checkpointed backfill
    Resume {
        /// Backfill ID to resume
        backfill_id: String,

        #[command(flatten)]
        execution: ExecutionArgs,
    },

    /// Show backfill status
    Status {
        /// Backfill ID (lists stored backfills when omitted)
        backfill_id: Option<String>,

        /// Directory holding backfill checkpoints
        #[arg(long)]
        state_dir: Option<PathBuf>,

        /// Print per-asset statuses as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(clap::Args)]
struct ExecutionArgs {
    /// Simulate a failure: `asset` or `asset[partition]` (repeatable)
    #[arg(long = "fail")]
    failures: Vec<String>,

    /// Simulated duration of each run in milliseconds
    #[arg(long, default_value = "0")]
    run_duration_ms: u64,

    /// Directory holding backfill checkpoints
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Maximum number of runs executing at once
    #[arg(long)]
    max_concurrent_runs: Option<usize>,
}

impl ExecutionArgs {
    fn options(&self) -> commands::run::RunOptions {
        commands::run::RunOptions {
            failures: self.failures.clone(),
            run_duration_ms: self.run_duration_ms,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG takes precedence over --verbose
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config::Config::load()?;

    // Execute command
    let status = match cli.command {
        Commands::Plan { selection, json } => {
            commands::plan::execute(&cli.graph, &selection, json).await?;
            None
        }
        Commands::Run {
            selection,
            backfill_id,
            execution,
        } => {
            let config = config.with_overrides(
                execution.state_dir.clone(),
                execution.max_concurrent_runs,
            )?;
            Some(
                commands::run::execute(
                    &cli.graph,
                    &selection,
                    backfill_id,
                    &execution.options(),
                    &config,
                )
                .await?,
            )
        }
        Commands::Resume {
            backfill_id,
            execution,
        } => {
            let config = config.with_overrides(
                execution.state_dir.clone(),
                execution.max_concurrent_runs,
            )?;
            Some(
                commands::run::resume(&cli.graph, &backfill_id, &execution.options(), &config)
                    .await?,
            )
        }
        Commands::Status {
            backfill_id,
            state_dir,
            json,
        } => {
            let config = config.with_overrides(state_dir, None)?;
            commands::status::execute(
                &cli.graph,
                backfill_id.as_deref(),
                &config.state_dir,
                json,
            )
            .await?;
            None
        }
    };

    // Convert backfill status to exit code
    use backfill_engine::BackfillRunStatus;
    match status {
        Some(BackfillRunStatus::CompletedWithFailures) | Some(BackfillRunStatus::Cancelled) => {
            std::process::exit(1)
        }
        Some(BackfillRunStatus::Completed) | None => {}
    }

    Ok(())
}
