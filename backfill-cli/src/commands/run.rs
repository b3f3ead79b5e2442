//! Run command
//!
//! Drives a backfill to completion against the local executor, checkpointing
//! progress under the state directory so an interrupted run can be resumed.

use super::{load_graph, parse_failure, print_statuses, FailureRule, SelectionArgs};
use crate::config::Config;
use anyhow::{Context, Result};
use backfill_engine::local_executor::LocalRunExecutorConfig;
use backfill_engine::{
    AssetBackfillData, BackfillDriver, BackfillReport, BackfillRunStatus, FileBackfillStore,
    LocalRunExecutor,
};
use backfill_graph::AssetGraph;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

/// Options shared by starting and resuming a backfill
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Simulated failures (`asset` or `asset[partition]`)
    pub failures: Vec<String>,
    /// Simulated duration of each run in milliseconds
    pub run_duration_ms: u64,
}

/// Start a new backfill
pub async fn execute(
    graph_path: &Path,
    selection_args: &SelectionArgs,
    backfill_id: Option<String>,
    options: &RunOptions,
    config: &Config,
) -> Result<BackfillRunStatus> {
    let graph = Arc::new(load_graph(graph_path)?);
    let selection = selection_args.to_selection(&graph)?;
    let start_time = selection_args.start_time()?;
    let backfill_data = AssetBackfillData::from_asset_partitions(&graph, &selection, start_time)
        .context("Failed to resolve backfill selection")?;

    let backfill_id = backfill_id.unwrap_or_else(new_backfill_id);
    info!(
        "Starting backfill {} over {} asset-partitions",
        backfill_id,
        backfill_data.target_subset().len()
    );

    let driver = build_driver(Arc::clone(&graph), options, config)?;
    let report = driver
        .run(&backfill_id, backfill_data)
        .await
        .with_context(|| format!("Backfill {} failed", backfill_id))?;

    print_report(&report, &graph, config);
    Ok(report.status)
}

/// Resume a backfill from its last checkpoint
pub async fn resume(
    graph_path: &Path,
    backfill_id: &str,
    options: &RunOptions,
    config: &Config,
) -> Result<BackfillRunStatus> {
    let graph = Arc::new(load_graph(graph_path)?);
    let driver = build_driver(Arc::clone(&graph), options, config)?;
    let report = driver
        .resume(backfill_id)
        .await
        .with_context(|| format!("Backfill {} failed to resume", backfill_id))?;

    print_report(&report, &graph, config);
    Ok(report.status)
}

fn build_driver(
    graph: Arc<AssetGraph>,
    options: &RunOptions,
    config: &Config,
) -> Result<BackfillDriver> {
    let mut executor_config = LocalRunExecutorConfig {
        run_duration: Duration::from_millis(options.run_duration_ms),
        ..Default::default()
    };
    for failure in &options.failures {
        match parse_failure(failure)? {
            FailureRule::Asset(asset_key) => {
                executor_config.failing_assets.insert(asset_key);
            }
            FailureRule::Partition(asset_partition) => {
                executor_config.failing_partitions.insert(asset_partition);
            }
        }
    }

    let executor = LocalRunExecutor::with_config(Arc::clone(&graph), executor_config);
    let store = FileBackfillStore::new(config.state_dir.clone());

    Ok(BackfillDriver::new(
        graph,
        Arc::new(executor),
        Arc::new(store),
        config.driver.clone(),
    )
    .with_cancellation(cancel_on_ctrl_c()))
}

/// Flip the returned flag when the process receives Ctrl-C
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, stopping after in-flight runs finish");
                let _ = tx.send(true);
            }
            Err(e) => warn!("Failed to listen for interrupts: {}", e),
        }
    });
    rx
}

fn new_backfill_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn print_report(report: &BackfillReport, graph: &AssetGraph, config: &Config) {
    let summary = &report.summary;
    println!("Backfill: {}", report.backfill_id);
    println!("Status: {:?}", report.status);
    println!("Iterations: {}", report.iterations);
    println!("Runs submitted: {}", report.runs_submitted);
    println!(
        "Materialized: {} / Failed: {} / In progress: {} / Not requested: {}",
        summary.num_materialized,
        summary.num_failed,
        summary.num_in_progress,
        summary.num_not_requested
    );
    println!("Checkpoint: {}", config.state_dir.display());
    println!();
    print_statuses(&report.backfill_data.get_backfill_status_per_asset_key(graph));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn demo_graph() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../demos/daily_pipeline.json")
    }

    fn selection(assets: &[&str]) -> SelectionArgs {
        SelectionArgs {
            assets: assets.iter().map(|a| a.to_string()).collect(),
            partitions: vec![],
            start: Some("2024-01-01".to_string()),
            end: Some("2024-01-14".to_string()),
            include_downstream: false,
            start_time: Some("2024-02-01".to_string()),
        }
    }

    #[tokio::test]
    async fn test_run_demo_pipeline_to_completion() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .with_overrides(Some(dir.path().to_path_buf()), None)
            .unwrap();

        let status = execute(
            &demo_graph(),
            &selection(&["raw_events", "cleaned_events", "daily_sessions"]),
            Some("demo".to_string()),
            &RunOptions::default(),
            &config,
        )
        .await
        .unwrap();

        assert_eq!(status, BackfillRunStatus::Completed);
        assert!(dir.path().join("demo.json").exists());
    }

    #[tokio::test]
    async fn test_run_reports_simulated_failures() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::default()
            .with_overrides(Some(dir.path().to_path_buf()), None)
            .unwrap();
        let options = RunOptions {
            failures: vec!["cleaned_events[2024-01-03]".to_string()],
            run_duration_ms: 0,
        };

        let status = execute(
            &demo_graph(),
            &selection(&["raw_events", "cleaned_events", "daily_sessions"]),
            Some("failing".to_string()),
            &options,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(status, BackfillRunStatus::CompletedWithFailures);
    }
}
