//! Custom assertions for backfill snapshots
//!
//! Provides assertion helpers that give better error messages than
//! comparing subsets by hand.

use backfill_core::AssetKey;
use backfill_engine::{AssetBackfillData, AssetBackfillStatus, AssetBackfillStatusSummary};

/// Assert the structural invariants every snapshot must hold
pub fn assert_snapshot_invariants(data: &AssetBackfillData) {
    let target = data.target_subset();
    assert!(
        data.materialized_subset().is_disjoint(data.failed_and_downstream_subset()),
        "materialized and failed overlap: {:?}",
        data.materialized_subset()
            .intersection(data.failed_and_downstream_subset())
    );
    assert!(
        data.requested_subset().is_subset(target),
        "requested asset-partitions outside the target"
    );
    assert!(
        data.materialized_subset().is_subset(target),
        "materialized asset-partitions outside the target"
    );
    assert!(
        data.failed_and_downstream_subset().is_subset(target),
        "failed asset-partitions outside the target"
    );
}

/// Assert no status set of `before` was lost in `after`
pub fn assert_monotonic(before: &AssetBackfillData, after: &AssetBackfillData) {
    assert!(
        before.requested_subset().is_subset(after.requested_subset()),
        "requested set shrank"
    );
    assert!(
        before.materialized_subset().is_subset(after.materialized_subset()),
        "materialized set shrank"
    );
    assert!(
        before
            .failed_and_downstream_subset()
            .is_subset(after.failed_and_downstream_subset()),
        "failed set shrank"
    );
}

/// Find the status summary of `asset_key`
pub fn summary_for<'a>(
    statuses: &'a [AssetBackfillStatusSummary],
    asset_key: &str,
) -> &'a AssetBackfillStatusSummary {
    let key = AssetKey::new(asset_key);
    statuses
        .iter()
        .find(|summary| summary.asset_key() == &key)
        .unwrap_or_else(|| panic!("no status summary for {asset_key}"))
}

/// Expected per-status partition counts of one asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedCounts {
    pub targeted: usize,
    pub in_progress: usize,
    pub materialized: usize,
    pub failed: usize,
}

/// Assert the partition counts of a partitioned asset's summary
pub fn assert_counts(summary: &AssetBackfillStatusSummary, expected: ExpectedCounts) {
    let actual = ExpectedCounts {
        targeted: summary.count(AssetBackfillStatus::Targeted),
        in_progress: summary.count(AssetBackfillStatus::InProgress),
        materialized: summary.count(AssetBackfillStatus::Materialized),
        failed: summary.count(AssetBackfillStatus::Failed),
    };
    assert_eq!(
        actual,
        expected,
        "unexpected status counts for {}",
        summary.asset_key()
    );
}
