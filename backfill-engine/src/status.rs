//! Backfill status reporting
//!
//! A read-only projection of a progress snapshot into per-asset statuses.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use backfill_core::AssetKey;

/// Status of a single targeted asset-partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetBackfillStatus {
    /// Selected, not yet requested
    Targeted,

    /// Requested and awaiting an outcome
    InProgress,

    /// Confirmed produced
    Materialized,

    /// Failed, or downstream of a failure
    Failed,
}

impl AssetBackfillStatus {
    /// Every status, in reporting order
    pub const ALL: [AssetBackfillStatus; 4] = [
        AssetBackfillStatus::Targeted,
        AssetBackfillStatus::InProgress,
        AssetBackfillStatus::Materialized,
        AssetBackfillStatus::Failed,
    ];

    /// Label used in logs, metrics and CLI output
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetBackfillStatus::Targeted => "TARGETED",
            AssetBackfillStatus::InProgress => "IN_PROGRESS",
            AssetBackfillStatus::Materialized => "MATERIALIZED",
            AssetBackfillStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for AssetBackfillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-asset status summary
///
/// Unpartitioned assets collapse to a single status; partitioned assets
/// report a count for every status, zeros included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AssetBackfillStatusSummary {
    Unpartitioned {
        asset_key: AssetKey,
        backfill_status: AssetBackfillStatus,
    },
    Partitioned {
        asset_key: AssetKey,
        partitions_counts_by_status: BTreeMap<AssetBackfillStatus, usize>,
        num_targeted_partitions: usize,
    },
}

impl AssetBackfillStatusSummary {
    /// Asset the summary describes
    pub fn asset_key(&self) -> &AssetKey {
        match self {
            AssetBackfillStatusSummary::Unpartitioned { asset_key, .. }
            | AssetBackfillStatusSummary::Partitioned { asset_key, .. } => asset_key,
        }
    }

    /// Scalar status, `None` for partitioned assets
    pub fn backfill_status(&self) -> Option<AssetBackfillStatus> {
        match self {
            AssetBackfillStatusSummary::Unpartitioned {
                backfill_status, ..
            } => Some(*backfill_status),
            AssetBackfillStatusSummary::Partitioned { .. } => None,
        }
    }

    /// Number of partitions in `status`
    ///
    /// Unpartitioned assets count as one partition.
    pub fn count(&self, status: AssetBackfillStatus) -> usize {
        match self {
            AssetBackfillStatusSummary::Unpartitioned {
                backfill_status, ..
            } => usize::from(*backfill_status == status),
            AssetBackfillStatusSummary::Partitioned {
                partitions_counts_by_status,
                ..
            } => partitions_counts_by_status.get(&status).copied().unwrap_or(0),
        }
    }

    /// Number of targeted partitions, one for unpartitioned assets
    pub fn num_targeted(&self) -> usize {
        match self {
            AssetBackfillStatusSummary::Unpartitioned { .. } => 1,
            AssetBackfillStatusSummary::Partitioned {
                num_targeted_partitions,
                ..
            } => *num_targeted_partitions,
        }
    }
}

/// Zeroed count map covering every status
pub(crate) fn empty_counts() -> BTreeMap<AssetBackfillStatus, usize> {
    AssetBackfillStatus::ALL
        .iter()
        .map(|status| (*status, 0))
        .collect()
}
