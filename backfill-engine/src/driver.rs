//! Backfill driver
//!
//! The driver owns the loop around [`advance`]: it submits the emitted run
//! requests to a [`RunExecutor`], waits for them, folds their outcomes into
//! the next iteration and checkpoints every snapshot to a [`BackfillStore`].
//! Calls to `advance` for one backfill are strictly sequential.

use crate::backfill_data::{AssetBackfillData, BackfillSummary};
use crate::concurrency::ConcurrencyLimiter;
use crate::executor::{RunExecutor, RunOutcome};
use crate::iteration::{advance, apply_outcomes, ObservedOutcomes};
use crate::metrics::{
    BACKFILL_ASSET_PARTITIONS_TOTAL, BACKFILL_ITERATIONS_TOTAL, BACKFILL_ITERATION_DURATION,
    BACKFILL_RUNS_IN_FLIGHT, BACKFILL_RUN_REQUESTS_TOTAL,
};
use crate::run_request::RunRequest;
use crate::store::BackfillStore;
use crate::{Error, Result};
use backfill_core::AssetPartition;
use backfill_graph::AssetGraph;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Configuration for the backfill driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackfillDriverConfig {
    /// Maximum number of runs executing at once (default: 4)
    pub max_concurrent_runs: usize,
    /// Iterations before the driver gives up (default: 10_000)
    pub max_iterations: usize,
    /// Pause between iterations (default: none)
    pub iteration_delay: Duration,
}

impl Default for BackfillDriverConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 4,
            max_iterations: 10_000,
            iteration_delay: Duration::ZERO,
        }
    }
}

/// How a driven backfill ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackfillRunStatus {
    /// Every targeted asset-partition materialized
    Completed,
    /// Every targeted asset-partition reached a terminal state, some failed
    CompletedWithFailures,
    /// The driver was cancelled before completion
    Cancelled,
}

/// Final state of a driven backfill
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillReport {
    pub backfill_id: String,
    pub status: BackfillRunStatus,
    pub iterations: usize,
    pub runs_submitted: usize,
    pub backfill_data: AssetBackfillData,
    pub summary: BackfillSummary,
}

/// Drives a backfill to completion
pub struct BackfillDriver {
    graph: Arc<AssetGraph>,
    executor: Arc<dyn RunExecutor>,
    store: Arc<dyn BackfillStore>,
    config: BackfillDriverConfig,
    limiter: ConcurrencyLimiter,
    cancel: Option<watch::Receiver<bool>>,
}

impl BackfillDriver {
    /// Create a new driver
    pub fn new(
        graph: Arc<AssetGraph>,
        executor: Arc<dyn RunExecutor>,
        store: Arc<dyn BackfillStore>,
        config: BackfillDriverConfig,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_runs);
        Self {
            graph,
            executor,
            store,
            config,
            limiter,
            cancel: None,
        }
    }

    /// Stop the loop once the watched value becomes `true`
    ///
    /// Cancellation is checked between iterations; runs already submitted
    /// are awaited and their outcomes checkpointed first.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &BackfillDriverConfig {
        &self.config
    }

    /// Drive a new backfill from its initial snapshot
    #[instrument(skip(self, backfill_data), fields(backfill_id = %backfill_id))]
    pub async fn run(
        &self,
        backfill_id: &str,
        backfill_data: AssetBackfillData,
    ) -> Result<BackfillReport> {
        info!(
            targeted = backfill_data.target_subset().len(),
            "Starting backfill"
        );
        self.drive(backfill_id, backfill_data, ObservedOutcomes::new())
            .await
    }

    /// Continue a backfill from its last checkpoint
    ///
    /// Runs that were in flight when the checkpoint was written have no
    /// recorded outcome; their asset-partitions are treated as failed.
    #[instrument(skip(self), fields(backfill_id = %backfill_id))]
    pub async fn resume(&self, backfill_id: &str) -> Result<BackfillReport> {
        let backfill_data = self.store.load(backfill_id).await?.ok_or_else(|| {
            Error::Storage(format!("no checkpoint found for backfill {backfill_id}"))
        })?;

        let mut outcomes = ObservedOutcomes::new();
        let interrupted = backfill_data.in_progress_subset();
        if !interrupted.is_empty() {
            warn!(
                interrupted = interrupted.len(),
                "Marking asset-partitions of interrupted runs as failed"
            );
            outcomes.failed = interrupted;
        }

        info!(
            targeted = backfill_data.target_subset().len(),
            requested = backfill_data.requested_subset().len(),
            "Resuming backfill"
        );
        self.drive(backfill_id, backfill_data, outcomes).await
    }

    async fn drive(
        &self,
        backfill_id: &str,
        mut backfill_data: AssetBackfillData,
        mut outcomes: ObservedOutcomes,
    ) -> Result<BackfillReport> {
        let mut iterations = 0;
        let mut runs_submitted = 0;

        loop {
            if self.is_cancelled() {
                if !outcomes.is_empty() {
                    backfill_data = apply_outcomes(&backfill_data, &self.graph, &outcomes)?;
                    self.store.save(backfill_id, &backfill_data).await?;
                }
                info!(iterations, "Backfill cancelled");
                return Ok(self.report(
                    backfill_id,
                    BackfillRunStatus::Cancelled,
                    iterations,
                    runs_submitted,
                    backfill_data,
                ));
            }
            if iterations >= self.config.max_iterations {
                return Err(Error::Stalled(format!(
                    "backfill {backfill_id} did not complete within {} iterations",
                    self.config.max_iterations
                )));
            }

            let timer = BACKFILL_ITERATION_DURATION.start_timer();
            let result = advance(backfill_id, &backfill_data, &self.graph, &outcomes);
            timer.observe_duration();
            let (next, run_requests) = match result {
                Ok(result) => result,
                Err(e) => {
                    BACKFILL_ITERATIONS_TOTAL.with_label_values(&["error"]).inc();
                    return Err(e);
                }
            };
            iterations += 1;
            record_iteration_metrics(&self.graph, &backfill_data, &next, &run_requests);

            self.store.save(backfill_id, &next).await?;
            let progressed = next != backfill_data;
            backfill_data = next;

            if backfill_data.is_complete() {
                let summary = backfill_data.summary();
                let status = if summary.num_failed == 0 {
                    BackfillRunStatus::Completed
                } else {
                    BackfillRunStatus::CompletedWithFailures
                };
                info!(
                    iterations,
                    runs_submitted,
                    materialized = summary.num_materialized,
                    failed = summary.num_failed,
                    "Backfill finished"
                );
                return Ok(self.report(
                    backfill_id,
                    status,
                    iterations,
                    runs_submitted,
                    backfill_data,
                ));
            }

            if run_requests.is_empty() && !progressed {
                return Err(Error::Stalled(format!(
                    "backfill {backfill_id} has {} asset-partitions in progress and nothing left to request",
                    backfill_data.in_progress_subset().len()
                )));
            }

            runs_submitted += run_requests.len();
            outcomes = self.execute_runs(backfill_id, &run_requests).await?;

            if !self.config.iteration_delay.is_zero() {
                tokio::time::sleep(self.config.iteration_delay).await;
            }
        }
    }

    /// Submit a batch of run requests and collect their outcomes
    async fn execute_runs(
        &self,
        backfill_id: &str,
        run_requests: &[RunRequest],
    ) -> Result<ObservedOutcomes> {
        let runs = run_requests
            .iter()
            .map(|request| self.execute_run(backfill_id, request));

        let mut outcomes = ObservedOutcomes::new();
        for run_outcomes in join_all(runs).await {
            outcomes.merge(run_outcomes?);
        }
        Ok(outcomes)
    }

    async fn execute_run(&self, backfill_id: &str, request: &RunRequest) -> Result<ObservedOutcomes> {
        let covered = request.asset_partitions(&self.graph)?;
        let _permit = self.limiter.acquire().await?;

        BACKFILL_RUNS_IN_FLIGHT.inc();
        let result = self.executor.execute(backfill_id, request).await;
        BACKFILL_RUNS_IN_FLIGHT.dec();

        let mut outcomes = ObservedOutcomes::new();
        match result {
            Ok(outcome) => {
                debug!(
                    run_id = %outcome.run_id,
                    materialized = outcome.materialized.len(),
                    failed = outcome.failed.len(),
                    "Run finished"
                );
                fold_run_outcome(&mut outcomes, outcome, covered);
            }
            Err(e) => {
                warn!(
                    assets = request.asset_selection.len(),
                    error = %e,
                    "Run could not be executed, marking its asset-partitions failed"
                );
                covered
                    .into_iter()
                    .for_each(|asset_partition| outcomes.record_failed(asset_partition));
            }
        }
        Ok(outcomes)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|cancel| *cancel.borrow())
            .unwrap_or(false)
    }

    fn report(
        &self,
        backfill_id: &str,
        status: BackfillRunStatus,
        iterations: usize,
        runs_submitted: usize,
        backfill_data: AssetBackfillData,
    ) -> BackfillReport {
        BackfillReport {
            backfill_id: backfill_id.to_string(),
            status,
            iterations,
            runs_submitted,
            summary: backfill_data.summary(),
            backfill_data,
        }
    }
}

/// Record a run outcome
///
/// Covered asset-partitions the executor did not report on take the run's
/// overall result.
fn fold_run_outcome(
    outcomes: &mut ObservedOutcomes,
    outcome: RunOutcome,
    covered: Vec<AssetPartition>,
) {
    let success = outcome.success();
    for asset_partition in covered {
        if outcome.materialized.contains(&asset_partition) || outcome.failed.contains(&asset_partition)
        {
            continue;
        }
        if success {
            outcomes.record_materialized(asset_partition);
        } else {
            outcomes.record_failed(asset_partition);
        }
    }
    outcome
        .materialized
        .into_iter()
        .for_each(|asset_partition| outcomes.record_materialized(asset_partition));
    outcome
        .failed
        .into_iter()
        .for_each(|asset_partition| outcomes.record_failed(asset_partition));
}

fn record_iteration_metrics(
    graph: &AssetGraph,
    previous: &AssetBackfillData,
    next: &AssetBackfillData,
    run_requests: &[RunRequest],
) {
    let outcome = if run_requests.is_empty() { "idle" } else { "requested" };
    BACKFILL_ITERATIONS_TOTAL.with_label_values(&[outcome]).inc();

    for request in run_requests {
        let policy = request
            .asset_selection
            .first()
            .and_then(|key| graph.backfill_policy(key))
            .map_or("none", |policy| policy.kind());
        BACKFILL_RUN_REQUESTS_TOTAL.with_label_values(&[policy]).inc();
    }

    let newly_materialized = next
        .materialized_subset()
        .len()
        .saturating_sub(previous.materialized_subset().len());
    let newly_failed = next
        .failed_and_downstream_subset()
        .len()
        .saturating_sub(previous.failed_and_downstream_subset().len());
    BACKFILL_ASSET_PARTITIONS_TOTAL
        .with_label_values(&["MATERIALIZED"])
        .inc_by(newly_materialized as u64);
    BACKFILL_ASSET_PARTITIONS_TOTAL
        .with_label_values(&["FAILED"])
        .inc_by(newly_failed as u64);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunId;
    use crate::local_executor::LocalRunExecutor;
    use crate::store::InMemoryBackfillStore;
    use crate::BackfillSelection;
    use backfill_core::AssetDefinition;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn chain_graph() -> Arc<AssetGraph> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let upstream = AssetDefinition::builder("upstream")
            .partitioned_daily(start)
            .single_run()
            .build();
        let downstream = AssetDefinition::builder("downstream")
            .partitioned_daily(start)
            .single_run()
            .depends_on("upstream")
            .build();
        Arc::new(AssetGraph::from_definitions(vec![upstream, downstream]).unwrap())
    }

    fn initial_data(graph: &AssetGraph) -> AssetBackfillData {
        let now = Utc.with_ymd_and_hms(2023, 1, 4, 6, 0, 0).unwrap();
        AssetBackfillData::from_asset_partitions(
            graph,
            &BackfillSelection::all_partitions(["upstream", "downstream"]),
            now,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_driver_completes_backfill() {
        let graph = chain_graph();
        let store = Arc::new(InMemoryBackfillStore::new());
        let driver = BackfillDriver::new(
            Arc::clone(&graph),
            Arc::new(LocalRunExecutor::new(Arc::clone(&graph))),
            store.clone(),
            BackfillDriverConfig::default(),
        );

        let report = driver.run("bf-1", initial_data(&graph)).await.unwrap();

        assert_eq!(report.status, BackfillRunStatus::Completed);
        // Same shape and a dependency edge: both assets go out in one run
        assert_eq!(report.runs_submitted, 1);
        assert_eq!(report.summary.num_materialized, 6);
        assert_eq!(report.summary.num_failed, 0);
        assert_eq!(
            store.load("bf-1").await.unwrap(),
            Some(report.backfill_data.clone())
        );
    }

    #[tokio::test]
    async fn test_driver_stops_when_cancelled() {
        let graph = chain_graph();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let driver = BackfillDriver::new(
            Arc::clone(&graph),
            Arc::new(LocalRunExecutor::new(Arc::clone(&graph))),
            Arc::new(InMemoryBackfillStore::new()),
            BackfillDriverConfig::default(),
        )
        .with_cancellation(rx);

        let report = driver.run("bf-1", initial_data(&graph)).await.unwrap();
        assert_eq!(report.status, BackfillRunStatus::Cancelled);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.runs_submitted, 0);
    }

    #[tokio::test]
    async fn test_resume_requires_checkpoint() {
        let graph = chain_graph();
        let driver = BackfillDriver::new(
            Arc::clone(&graph),
            Arc::new(LocalRunExecutor::new(Arc::clone(&graph))),
            Arc::new(InMemoryBackfillStore::new()),
            BackfillDriverConfig::default(),
        );

        let err = driver.resume("missing").await.unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
    }

    #[test]
    fn test_unreported_partitions_take_run_result() {
        let covered = vec![
            AssetPartition::partitioned("a", "2023-01-01"),
            AssetPartition::partitioned("a", "2023-01-02"),
        ];

        let mut outcomes = ObservedOutcomes::new();
        fold_run_outcome(
            &mut outcomes,
            RunOutcome {
                run_id: RunId::new(),
                materialized: vec![AssetPartition::partitioned("a", "2023-01-01")],
                failed: vec![],
                error: Some("boom".to_string()),
            },
            covered,
        );

        assert!(outcomes
            .materialized
            .contains(&AssetPartition::partitioned("a", "2023-01-01")));
        assert!(outcomes
            .failed
            .contains(&AssetPartition::partitioned("a", "2023-01-02")));
    }

    #[test]
    fn test_default_config() {
        let config = BackfillDriverConfig::default();
        assert_eq!(config.max_concurrent_runs, 4);
        assert_eq!(config.max_iterations, 10_000);
        assert!(config.iteration_delay.is_zero());
    }
}
