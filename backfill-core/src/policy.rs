//! Backfill policies
//!
//! A backfill policy declares how the targeted partitions of an asset are
//! batched into run requests: all of them in a single run, or split into
//! consecutive chunks of bounded size.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Errors raised when constructing a backfill policy
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("max_partitions_per_run must be greater than zero")]
    ZeroPartitionsPerRun,
}

/// Per-asset batching rule for backfill run requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackfillPolicy {
    /// Every targeted partition of the asset is requested in one run
    SingleRun,

    /// Targeted partitions are split into ordered chunks of at most
    /// `max_partitions_per_run` keys, one run per chunk
    MultiRun { max_partitions_per_run: NonZeroU32 },
}

impl BackfillPolicy {
    /// Policy that materializes all targeted partitions in one run
    pub const fn single_run() -> Self {
        BackfillPolicy::SingleRun
    }

    /// Policy that splits targeted partitions into chunks of `max_partitions_per_run`
    pub fn multi_run(max_partitions_per_run: u32) -> Result<Self, PolicyError> {
        NonZeroU32::new(max_partitions_per_run)
            .map(|max_partitions_per_run| BackfillPolicy::MultiRun {
                max_partitions_per_run,
            })
            .ok_or(PolicyError::ZeroPartitionsPerRun)
    }

    /// Multi-run policy with one partition per run
    pub const fn multi_run_default() -> Self {
        BackfillPolicy::MultiRun {
            max_partitions_per_run: NonZeroU32::MIN,
        }
    }

    /// Chunk size for multi-run policies, `None` for single-run
    pub fn max_partitions_per_run(&self) -> Option<u32> {
        match self {
            BackfillPolicy::SingleRun => None,
            BackfillPolicy::MultiRun {
                max_partitions_per_run,
            } => Some(max_partitions_per_run.get()),
        }
    }

    /// Short label used in logs and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            BackfillPolicy::SingleRun => "single_run",
            BackfillPolicy::MultiRun { .. } => "multi_run",
        }
    }
}

impl fmt::Display for BackfillPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackfillPolicy::SingleRun => write!(f, "single_run"),
            BackfillPolicy::MultiRun {
                max_partitions_per_run,
            } => write!(f, "multi_run({})", max_partitions_per_run),
        }
    }
}
