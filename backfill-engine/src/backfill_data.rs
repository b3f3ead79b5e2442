//! Asset backfill progress
//!
//! [`AssetBackfillData`] tracks, for one backfill, which asset-partitions were
//! targeted, requested, materialized and failed. It is a value: every
//! iteration returns a new snapshot, so comparing two snapshots tells whether
//! anything progressed.
//!
//! Invariants held by every snapshot built through this crate:
//! - `requested`, `materialized` and `failed` are subsets of `target`
//! - `materialized` and `failed` are disjoint
//! - across iterations no set ever shrinks

use crate::status::{empty_counts, AssetBackfillStatus, AssetBackfillStatusSummary};
use crate::{Error, Result};
use backfill_core::{AssetKey, AssetPartition, AssetPartitionSubset, MappedPartitions};
use backfill_graph::AssetGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Partitions to select for each partitioned asset of a new backfill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PartitionSelection {
    /// Every partition that exists as of the backfill start time
    All,

    /// An explicit list of partition keys
    Keys { keys: Vec<String> },

    /// Keys between `start` and `end`, both inclusive
    Range { start: String, end: String },
}

/// Initial selection of a backfill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSelection {
    pub asset_keys: Vec<AssetKey>,
    pub partitions: PartitionSelection,
}

impl BackfillSelection {
    /// Select every partition of `asset_keys`
    pub fn all_partitions<I, K>(asset_keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<AssetKey>,
    {
        Self {
            asset_keys: asset_keys.into_iter().map(Into::into).collect(),
            partitions: PartitionSelection::All,
        }
    }

    /// Select explicit partition keys of `asset_keys`
    pub fn keys<I, K>(asset_keys: I, keys: Vec<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<AssetKey>,
    {
        Self {
            asset_keys: asset_keys.into_iter().map(Into::into).collect(),
            partitions: PartitionSelection::Keys { keys },
        }
    }

    /// Select an inclusive partition key range of `asset_keys`
    pub fn range<I, K>(asset_keys: I, start: impl Into<String>, end: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<AssetKey>,
    {
        Self {
            asset_keys: asset_keys.into_iter().map(Into::into).collect(),
            partitions: PartitionSelection::Range {
                start: start.into(),
                end: end.into(),
            },
        }
    }
}

/// Counts across the whole backfill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackfillSummary {
    pub num_targeted: usize,
    pub num_requested: usize,
    pub num_materialized: usize,
    pub num_failed: usize,
    pub num_in_progress: usize,
    pub num_not_requested: usize,
}

/// Progress snapshot of one asset backfill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBackfillData {
    target_subset: AssetPartitionSubset,
    requested_subset: AssetPartitionSubset,
    materialized_subset: AssetPartitionSubset,
    failed_and_downstream_subset: AssetPartitionSubset,
    backfill_start_time: DateTime<Utc>,
}

impl AssetBackfillData {
    /// Start a backfill over an explicit target with no progress
    pub fn empty(target_subset: AssetPartitionSubset, backfill_start_time: DateTime<Utc>) -> Self {
        Self {
            target_subset,
            requested_subset: AssetPartitionSubset::new(),
            materialized_subset: AssetPartitionSubset::new(),
            failed_and_downstream_subset: AssetPartitionSubset::new(),
            backfill_start_time,
        }
    }

    /// Build the target of a new backfill from a selection
    ///
    /// Assets are resolved in topological order. When the selected keys are
    /// not valid for an asset's partitions definition, that asset's target is
    /// derived from the partitions of its targeted parents instead.
    #[tracing::instrument(skip(graph, selection), fields(assets = selection.asset_keys.len()))]
    pub fn from_asset_partitions(
        graph: &AssetGraph,
        selection: &BackfillSelection,
        backfill_start_time: DateTime<Utc>,
    ) -> Result<Self> {
        if selection.asset_keys.is_empty() {
            return Err(Error::InvalidSelection("no assets selected".to_string()));
        }

        let selected: BTreeSet<&AssetKey> = selection.asset_keys.iter().collect();
        for key in &selected {
            graph.require_node(key)?;
        }

        let as_of = backfill_start_time.naive_utc();
        let mut target = AssetPartitionSubset::new();

        for key in graph.toposorted_keys() {
            if !selected.contains(key) {
                continue;
            }

            let Some(partitions_def) = graph.partitions_def(key) else {
                target.insert(AssetPartition::unpartitioned(key.clone()));
                continue;
            };

            let selected_keys = match &selection.partitions {
                PartitionSelection::All => Some(partitions_def.keys(as_of)),
                PartitionSelection::Keys { keys } => {
                    if keys.iter().all(|k| partitions_def.has_key(k, as_of)) {
                        Some(partitions_def.sort_keys(keys.iter().map(String::as_str))?)
                    } else {
                        None
                    }
                }
                PartitionSelection::Range { start, end } => partitions_def
                    .keys_in_range(start, end)
                    .ok()
                    .filter(|keys| keys.iter().all(|k| partitions_def.has_key(k, as_of))),
            };

            let keys = match selected_keys {
                Some(keys) => keys,
                None => derive_from_parents(graph, key, &target, as_of)?,
            };

            if keys.is_empty() {
                return Err(Error::InvalidSelection(format!(
                    "no partitions of {key} match the selection as of {backfill_start_time}"
                )));
            }

            debug!(asset = %key, partitions = keys.len(), "Targeted partitions");
            target.extend(
                keys.into_iter()
                    .map(|pk| AssetPartition::partitioned(key.clone(), pk)),
            );
        }

        Ok(Self::empty(target, backfill_start_time))
    }

    pub(crate) fn with_progress(
        &self,
        requested_subset: AssetPartitionSubset,
        materialized_subset: AssetPartitionSubset,
        failed_and_downstream_subset: AssetPartitionSubset,
    ) -> Self {
        Self {
            target_subset: self.target_subset.clone(),
            requested_subset,
            materialized_subset,
            failed_and_downstream_subset,
            backfill_start_time: self.backfill_start_time,
        }
    }

    /// Every asset-partition selected for this backfill
    pub fn target_subset(&self) -> &AssetPartitionSubset {
        &self.target_subset
    }

    /// Asset-partitions a run request was emitted for
    pub fn requested_subset(&self) -> &AssetPartitionSubset {
        &self.requested_subset
    }

    /// Asset-partitions confirmed produced
    pub fn materialized_subset(&self) -> &AssetPartitionSubset {
        &self.materialized_subset
    }

    /// Asset-partitions that failed or are downstream of a failure
    pub fn failed_and_downstream_subset(&self) -> &AssetPartitionSubset {
        &self.failed_and_downstream_subset
    }

    /// Time the backfill was created; partition key spaces are evaluated as of it
    pub fn backfill_start_time(&self) -> DateTime<Utc> {
        self.backfill_start_time
    }

    /// Requested asset-partitions still awaiting an outcome
    pub fn in_progress_subset(&self) -> AssetPartitionSubset {
        self.requested_subset
            .difference(&self.materialized_subset)
            .difference(&self.failed_and_downstream_subset)
    }

    /// Targeted asset-partitions with no request and no outcome
    pub fn not_requested_subset(&self) -> AssetPartitionSubset {
        self.target_subset
            .difference(&self.requested_subset)
            .difference(&self.materialized_subset)
            .difference(&self.failed_and_downstream_subset)
    }

    /// Whether every targeted asset-partition has a final outcome
    pub fn is_complete(&self) -> bool {
        self.target_subset
            .iter()
            .all(|ap| self.materialized_subset.contains(ap) || self.failed_and_downstream_subset.contains(ap))
    }

    /// Whether every targeted asset-partition was requested or failed
    pub fn all_requested_or_failed(&self) -> bool {
        self.not_requested_subset().is_empty()
    }

    /// Status of one asset-partition, `None` if it is not targeted
    pub fn status_of(&self, asset_partition: &AssetPartition) -> Option<AssetBackfillStatus> {
        if !self.target_subset.contains(asset_partition) {
            None
        } else if self.materialized_subset.contains(asset_partition) {
            Some(AssetBackfillStatus::Materialized)
        } else if self.failed_and_downstream_subset.contains(asset_partition) {
            Some(AssetBackfillStatus::Failed)
        } else if self.requested_subset.contains(asset_partition) {
            Some(AssetBackfillStatus::InProgress)
        } else {
            Some(AssetBackfillStatus::Targeted)
        }
    }

    /// Per-asset statuses, in topological order of the graph
    ///
    /// Targeted assets the graph no longer knows are reported last, by key.
    pub fn get_backfill_status_per_asset_key(
        &self,
        graph: &AssetGraph,
    ) -> Vec<AssetBackfillStatusSummary> {
        let targeted_assets = self.target_subset.asset_keys();
        let mut ordered: Vec<&AssetKey> = graph
            .toposorted_keys()
            .iter()
            .filter(|key| targeted_assets.contains(*key))
            .collect();
        ordered.extend(targeted_assets.iter().filter(|key| !graph.contains(key)));

        ordered
            .into_iter()
            .map(|key| self.status_summary(graph, key))
            .collect()
    }

    fn status_summary(&self, graph: &AssetGraph, key: &AssetKey) -> AssetBackfillStatusSummary {
        let partitions: Vec<&AssetPartition> = self.target_subset.for_asset(key).collect();
        let unpartitioned = !graph.is_partitioned(key)
            && partitions.len() == 1
            && partitions[0].partition_key.is_none();

        if unpartitioned {
            let backfill_status = self
                .status_of(partitions[0])
                .unwrap_or(AssetBackfillStatus::Targeted);
            return AssetBackfillStatusSummary::Unpartitioned {
                asset_key: key.clone(),
                backfill_status,
            };
        }

        let mut partitions_counts_by_status = empty_counts();
        for ap in &partitions {
            if let Some(status) = self.status_of(ap) {
                *partitions_counts_by_status.entry(status).or_insert(0) += 1;
            }
        }
        AssetBackfillStatusSummary::Partitioned {
            asset_key: key.clone(),
            partitions_counts_by_status,
            num_targeted_partitions: partitions.len(),
        }
    }

    /// Counts across the whole backfill
    pub fn summary(&self) -> BackfillSummary {
        BackfillSummary {
            num_targeted: self.target_subset.len(),
            num_requested: self.requested_subset.len(),
            num_materialized: self.materialized_subset.len(),
            num_failed: self.failed_and_downstream_subset.len(),
            num_in_progress: self.in_progress_subset().len(),
            num_not_requested: self.not_requested_subset().len(),
        }
    }

    /// Serialize the snapshot to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Restore a snapshot from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Partitions of `key` implied by the partitions already targeted for its parents
fn derive_from_parents(
    graph: &AssetGraph,
    key: &AssetKey,
    target: &AssetPartitionSubset,
    as_of: chrono::NaiveDateTime,
) -> Result<Vec<String>> {
    let partitions_def = graph
        .partitions_def(key)
        .ok_or_else(|| Error::Internal(format!("{key} is not partitioned")))?;

    let mut derived = BTreeSet::new();
    for (parent, mapping) in graph.parents(key) {
        let parent_def = graph.partitions_def(parent);
        for parent_partition in target.for_asset(parent) {
            let mapped = mapping.downstream_partitions(
                parent_def,
                parent_partition.partition_key.as_deref(),
                Some(partitions_def),
            )?;
            match mapped {
                MappedPartitions::All => derived.extend(partitions_def.keys(as_of)),
                MappedPartitions::Keys(keys) => derived.extend(
                    keys.into_iter()
                        .flatten()
                        .filter(|k| partitions_def.has_key(k, as_of)),
                ),
            }
        }
    }

    if derived.is_empty() {
        return Err(Error::InvalidSelection(format!(
            "selected partitions are not valid for {key} and cannot be derived from its parents"
        )));
    }

    Ok(partitions_def.sort_keys(derived.iter().map(String::as_str))?)
}
