//! # Backfill Engine
//!
//! Asset backfill scheduling: progress snapshots, the iteration that turns a
//! snapshot into the next batch of run requests, failure contagion, status
//! reporting, and an async driver that executes the loop end to end.

pub mod backfill_data;
pub mod concurrency;
pub mod contagion;
pub mod driver;
pub mod executor;
pub mod grouping;
pub mod iteration;
pub mod local_executor;
pub mod metrics;
pub mod run_request;
pub mod status;
pub mod store;

// Re-export commonly used types
pub use backfill_data::{AssetBackfillData, BackfillSelection, BackfillSummary, PartitionSelection};
pub use driver::{BackfillDriver, BackfillDriverConfig, BackfillReport, BackfillRunStatus};
pub use executor::{RunExecutor, RunId, RunOutcome};
pub use iteration::{
    advance, apply_outcomes, execute_asset_backfill_iteration, AssetBackfillIterationResult,
    ObservedOutcomes,
};
pub use local_executor::LocalRunExecutor;
pub use run_request::{PartitionKeyRange, RunRequest};
pub use status::{AssetBackfillStatus, AssetBackfillStatusSummary};
pub use store::{BackfillStore, FileBackfillStore, InMemoryBackfillStore};

use backfill_core::{PartitionError, PartitionMappingError};

/// Message raised when only some targeted assets declare a backfill policy
pub const MIXED_BACKFILL_POLICY_MESSAGE: &str =
    "Either all assets must have backfill policies or none of them must have backfill policies";

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for engine operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Backfill configuration error: {0}")]
    Configuration(String),

    #[error("Graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("Invalid backfill selection: {0}")]
    InvalidSelection(String),

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backfill stalled: {0}")]
    Stalled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<PartitionError> for Error {
    fn from(err: PartitionError) -> Self {
        Error::GraphInconsistency(err.to_string())
    }
}

impl From<PartitionMappingError> for Error {
    fn from(err: PartitionMappingError) -> Self {
        Error::GraphInconsistency(err.to_string())
    }
}

impl From<backfill_graph::Error> for Error {
    fn from(err: backfill_graph::Error) -> Self {
        Error::GraphInconsistency(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
