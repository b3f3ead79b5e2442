//! Mock run executors
//!
//! Provides scripted executors for driving backfills without a real
//! execution engine.

use async_trait::async_trait;
use backfill_core::{AssetKey, AssetPartition};
use backfill_engine::{Error, Result, RunExecutor, RunId, RunOutcome, RunRequest};
use backfill_graph::AssetGraph;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Run executor whose outcomes are scripted up front
///
/// Every asset-partition a request covers materializes unless a failure rule
/// matches it. Requests selecting an asset registered with
/// [`ScriptedRunExecutor::reject_asset`] return an error instead of an
/// outcome. Submitted requests and the peak number of concurrent runs are
/// recorded for assertions.
///
/// # Example
///
/// ```ignore
/// use backfill_tests::mocks::ScriptedRunExecutor;
///
/// let executor = ScriptedRunExecutor::new(graph.clone()).fail_asset("daily");
/// // Hand `Arc::new(executor)` to a BackfillDriver...
/// ```
pub struct ScriptedRunExecutor {
    graph: Arc<AssetGraph>,
    failing_assets: HashSet<AssetKey>,
    failing_partitions: HashSet<AssetPartition>,
    rejected_assets: HashSet<AssetKey>,
    run_duration: Duration,
    requests: Mutex<Vec<RunRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedRunExecutor {
    /// Create an executor that materializes everything
    pub fn new(graph: Arc<AssetGraph>) -> Self {
        Self {
            graph,
            failing_assets: HashSet::new(),
            failing_partitions: HashSet::new(),
            rejected_assets: HashSet::new(),
            run_duration: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail every partition of `asset_key`
    pub fn fail_asset(mut self, asset_key: impl Into<AssetKey>) -> Self {
        self.failing_assets.insert(asset_key.into());
        self
    }

    /// Fail one asset-partition
    pub fn fail_partition(mut self, asset_partition: AssetPartition) -> Self {
        self.failing_partitions.insert(asset_partition);
        self
    }

    /// Return an execution error for any run selecting `asset_key`
    pub fn reject_asset(mut self, asset_key: impl Into<AssetKey>) -> Self {
        self.rejected_assets.insert(asset_key.into());
        self
    }

    /// Hold every run open for `duration`
    pub fn with_run_duration(mut self, duration: Duration) -> Self {
        self.run_duration = duration;
        self
    }

    /// Requests submitted so far, in submission order
    pub async fn requests(&self) -> Vec<RunRequest> {
        self.requests.lock().await.clone()
    }

    /// Highest number of runs observed executing at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, asset_partition: &AssetPartition) -> bool {
        self.failing_assets.contains(&asset_partition.asset_key)
            || self.failing_partitions.contains(asset_partition)
    }
}

#[async_trait]
impl RunExecutor for ScriptedRunExecutor {
    async fn execute(&self, _backfill_id: &str, request: &RunRequest) -> Result<RunOutcome> {
        self.requests.lock().await.push(request.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.run_duration.is_zero() {
            tokio::time::sleep(self.run_duration).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(rejected) = request
            .asset_selection
            .iter()
            .find(|key| self.rejected_assets.contains(*key))
        {
            return Err(Error::Execution(format!("run for {rejected} was rejected")));
        }

        let (failed, materialized): (Vec<_>, Vec<_>) = request
            .asset_partitions(&self.graph)?
            .into_iter()
            .partition(|asset_partition| self.should_fail(asset_partition));
        let error = (!failed.is_empty()).then(|| "scripted failure".to_string());

        Ok(RunOutcome {
            run_id: RunId::new(),
            materialized,
            failed,
            error,
        })
    }
}
