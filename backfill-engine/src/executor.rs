//! Run executor interface

use crate::run_request::RunRequest;
use crate::Result;
use async_trait::async_trait;
use backfill_core::AssetPartition;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a submitted run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of executing one run request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub materialized: Vec<AssetPartition>,
    pub failed: Vec<AssetPartition>,
    pub error: Option<String>,
}

impl RunOutcome {
    /// Whether every covered asset-partition materialized
    pub fn success(&self) -> bool {
        self.failed.is_empty() && self.error.is_none()
    }
}

/// Trait for run executors
///
/// `execute` resolves once the run has finished. An `Err` means the run could
/// not be executed at all; the driver then treats everything it covers as failed.
#[async_trait]
pub trait RunExecutor: Send + Sync {
    /// Execute a run request to completion
    async fn execute(&self, backfill_id: &str, request: &RunRequest) -> Result<RunOutcome>;
}
