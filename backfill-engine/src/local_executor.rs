//! Local executor for development and testing
//!
//! Runs are simulated in-process: every asset-partition a request covers is
//! materialized unless a failure rule matches it. Assets are processed in
//! topological order within a run, and once an asset fails, the assets
//! downstream of it in the same run are skipped and reported as failed.

use crate::executor::{RunExecutor, RunId, RunOutcome};
use crate::run_request::RunRequest;
use crate::Result;
use async_trait::async_trait;
use backfill_core::{AssetKey, AssetPartition};
use backfill_graph::AssetGraph;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Configuration for the local executor
#[derive(Debug, Clone, Default)]
pub struct LocalRunExecutorConfig {
    /// Simulated duration of every run (defaults to none)
    pub run_duration: Duration,
    /// Assets whose every partition fails
    pub failing_assets: HashSet<AssetKey>,
    /// Individual asset-partitions that fail
    pub failing_partitions: HashSet<AssetPartition>,
}

/// In-process run executor
pub struct LocalRunExecutor {
    graph: Arc<AssetGraph>,
    config: LocalRunExecutorConfig,
    /// Requests executed so far, in completion order
    history: RwLock<Vec<RunRequest>>,
}

impl LocalRunExecutor {
    /// Create an executor that materializes everything
    pub fn new(graph: Arc<AssetGraph>) -> Self {
        Self::with_config(graph, LocalRunExecutorConfig::default())
    }

    pub fn with_config(graph: Arc<AssetGraph>, config: LocalRunExecutorConfig) -> Self {
        Self {
            graph,
            config,
            history: RwLock::new(Vec::new()),
        }
    }

    /// Fail every partition of `asset_key`
    pub fn fail_asset(mut self, asset_key: impl Into<AssetKey>) -> Self {
        self.config.failing_assets.insert(asset_key.into());
        self
    }

    /// Fail one asset-partition
    pub fn fail_partition(mut self, asset_partition: AssetPartition) -> Self {
        self.config.failing_partitions.insert(asset_partition);
        self
    }

    /// Requests executed so far
    pub async fn history(&self) -> Vec<RunRequest> {
        self.history.read().await.clone()
    }

    fn should_fail(&self, asset_partition: &AssetPartition) -> bool {
        self.config.failing_assets.contains(&asset_partition.asset_key)
            || self.config.failing_partitions.contains(asset_partition)
    }

    fn simulate(&self, request: &RunRequest) -> Result<RunOutcome> {
        let mut covered = request.asset_partitions(&self.graph)?;
        covered.sort_by_key(|ap| {
            (
                self.graph.topological_position(&ap.asset_key),
                ap.asset_key.clone(),
            )
        });

        let mut failed_assets: HashSet<&AssetKey> = HashSet::new();
        let mut materialized = Vec::new();
        let mut failed = Vec::new();

        for asset_partition in &covered {
            let upstream_failed = self
                .graph
                .parents(&asset_partition.asset_key)
                .iter()
                .any(|(parent, _)| failed_assets.contains(parent));

            if upstream_failed || self.should_fail(asset_partition) {
                failed_assets.insert(&asset_partition.asset_key);
                failed.push(asset_partition.clone());
            } else {
                materialized.push(asset_partition.clone());
            }
        }

        let error = (!failed.is_empty())
            .then(|| format!("{} asset-partitions failed", failed.len()));
        Ok(RunOutcome {
            run_id: RunId::new(),
            materialized,
            failed,
            error,
        })
    }
}

#[async_trait]
impl RunExecutor for LocalRunExecutor {
    #[instrument(
        name = "local_executor.execute",
        skip(self, request),
        fields(backfill_id = %backfill_id, assets = request.asset_selection.len())
    )]
    async fn execute(&self, backfill_id: &str, request: &RunRequest) -> Result<RunOutcome> {
        if !self.config.run_duration.is_zero() {
            tokio::time::sleep(self.config.run_duration).await;
        }

        let outcome = self.simulate(request)?;
        debug!(
            run_id = %outcome.run_id,
            materialized = outcome.materialized.len(),
            failed = outcome.failed.len(),
            "Local run finished"
        );
        self.history.write().await.push(request.clone());
        Ok(outcome)
    }
}
