//! Backfill iteration
//!
//! One iteration takes a progress snapshot, the asset graph, and the outcomes
//! observed since the previous iteration, and returns the next snapshot
//! together with the run requests to submit. It performs no I/O and keeps no
//! state between calls.
//!
//! # Steps
//!
//! 1. Validate that every targeted asset is in the graph and that either all
//!    or none of them declare a backfill policy
//! 2. Fold observed outcomes into the materialized and failed sets
//! 3. Propagate failures to targeted descendants until nothing changes
//! 4. Walk assets in topological order and collect the requestable frontier
//! 5. Group the frontier into run requests and mark it requested

use crate::backfill_data::AssetBackfillData;
use crate::contagion::{fold_outcomes, propagate_failures};
use crate::grouping::{build_run_requests, same_run_shape};
use crate::run_request::RunRequest;
use crate::{Error, Result, MIXED_BACKFILL_POLICY_MESSAGE};
use backfill_core::{
    AssetKey, AssetPartition, AssetPartitionSubset, BackfillPolicy, MappedPartitions,
    PartitionMapping,
};
use backfill_graph::AssetGraph;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Outcomes observed for requested asset-partitions since the last iteration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedOutcomes {
    pub materialized: AssetPartitionSubset,
    pub failed: AssetPartitionSubset,
}

impl ObservedOutcomes {
    /// No outcomes
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing was observed
    pub fn is_empty(&self) -> bool {
        self.materialized.is_empty() && self.failed.is_empty()
    }

    /// Record a successful materialization
    pub fn record_materialized(&mut self, asset_partition: AssetPartition) {
        self.materialized.insert(asset_partition);
    }

    /// Record a failure
    pub fn record_failed(&mut self, asset_partition: AssetPartition) {
        self.failed.insert(asset_partition);
    }

    /// Add every outcome of `other`
    pub fn merge(&mut self, other: ObservedOutcomes) {
        self.materialized.extend(other.materialized);
        self.failed.extend(other.failed);
    }
}

/// Next snapshot and the run requests to submit
#[derive(Debug, Clone, PartialEq)]
pub struct AssetBackfillIterationResult {
    pub backfill_data: AssetBackfillData,
    pub run_requests: Vec<RunRequest>,
}

/// Advance a backfill by one iteration
///
/// Returns the next snapshot and the run requests to submit. Configuration
/// errors are raised before any run request is built.
pub fn advance(
    backfill_id: &str,
    backfill_data: &AssetBackfillData,
    graph: &AssetGraph,
    outcomes: &ObservedOutcomes,
) -> Result<(AssetBackfillData, Vec<RunRequest>)> {
    let result = execute_asset_backfill_iteration(backfill_id, backfill_data, graph, outcomes)?;
    Ok((result.backfill_data, result.run_requests))
}

/// Run one backfill iteration
#[instrument(skip_all, fields(backfill_id = %backfill_id))]
pub fn execute_asset_backfill_iteration(
    backfill_id: &str,
    backfill_data: &AssetBackfillData,
    graph: &AssetGraph,
    outcomes: &ObservedOutcomes,
) -> Result<AssetBackfillIterationResult> {
    let target = backfill_data.target_subset();
    validate_target(graph, target)?;

    let (materialized, mut failed) = fold_outcomes(backfill_data, outcomes);
    propagate_failures(graph, target, &materialized, &mut failed)?;

    let to_request = requestable_frontier(graph, backfill_data, &materialized, &failed)?;
    let run_requests = build_run_requests(backfill_id, graph, &to_request)?;

    debug!(
        requested = to_request.len(),
        run_requests = run_requests.len(),
        materialized = materialized.len(),
        failed = failed.len(),
        "Backfill iteration complete"
    );

    let requested = backfill_data.requested_subset().union(&to_request);
    Ok(AssetBackfillIterationResult {
        backfill_data: backfill_data.with_progress(requested, materialized, failed),
        run_requests,
    })
}

/// Fold outcomes into a snapshot without requesting anything new
///
/// Used when a driver stops between iterations so observed outcomes are not
/// lost from the checkpoint.
pub fn apply_outcomes(
    backfill_data: &AssetBackfillData,
    graph: &AssetGraph,
    outcomes: &ObservedOutcomes,
) -> Result<AssetBackfillData> {
    let target = backfill_data.target_subset();
    validate_target(graph, target)?;

    let (materialized, mut failed) = fold_outcomes(backfill_data, outcomes);
    propagate_failures(graph, target, &materialized, &mut failed)?;
    Ok(backfill_data.with_progress(
        backfill_data.requested_subset().clone(),
        materialized,
        failed,
    ))
}

/// Check that targeted assets exist and agree on backfill policy presence
pub fn validate_target(graph: &AssetGraph, target: &AssetPartitionSubset) -> Result<()> {
    let assets = target.asset_keys();
    for key in &assets {
        graph.require_node(key)?;
    }

    let with_policy = assets
        .iter()
        .filter(|key| graph.backfill_policy(key).is_some())
        .count();
    if with_policy != 0 && with_policy != assets.len() {
        return Err(Error::Configuration(MIXED_BACKFILL_POLICY_MESSAGE.to_string()));
    }
    Ok(())
}

/// Targeted asset-partitions that can be requested now
///
/// A candidate is ready when every targeted parent partition it reads from is
/// materialized, or is being requested in this iteration by an asset that can
/// share its run. Single-run assets wait until all of their remaining
/// partitions are ready, so one run covers them.
fn requestable_frontier(
    graph: &AssetGraph,
    backfill_data: &AssetBackfillData,
    materialized: &AssetPartitionSubset,
    failed: &AssetPartitionSubset,
) -> Result<AssetPartitionSubset> {
    let target = backfill_data.target_subset();
    let requested = backfill_data.requested_subset();
    let mut to_request = AssetPartitionSubset::new();

    for asset in graph.toposorted_keys() {
        let candidates: Vec<&AssetPartition> = target
            .for_asset(asset)
            .filter(|ap| !requested.contains(ap) && !materialized.contains(ap) && !failed.contains(ap))
            .collect();
        if candidates.is_empty() {
            continue;
        }

        let targeted_parents: Vec<(&AssetKey, PartitionMapping)> = graph
            .parents(asset)
            .into_iter()
            .filter(|(parent, _)| target.count_for_asset(parent) > 0)
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let mut satisfied = true;
            for (parent, mapping) in &targeted_parents {
                if !parent_satisfied(
                    graph,
                    candidate,
                    parent,
                    *mapping,
                    target,
                    materialized,
                    &to_request,
                )? {
                    satisfied = false;
                    break;
                }
            }
            if satisfied {
                ready.push((*candidate).clone());
            }
        }

        let single_run = graph.backfill_policy(asset) == Some(BackfillPolicy::SingleRun);
        if single_run && ready.len() != candidates.len() {
            debug!(
                asset = %asset,
                ready = ready.len(),
                remaining = candidates.len(),
                "Waiting for all partitions of single-run asset"
            );
            continue;
        }
        to_request.extend(ready);
    }

    Ok(to_request)
}

fn parent_satisfied(
    graph: &AssetGraph,
    candidate: &AssetPartition,
    parent: &AssetKey,
    mapping: PartitionMapping,
    target: &AssetPartitionSubset,
    materialized: &AssetPartitionSubset,
    to_request: &AssetPartitionSubset,
) -> Result<bool> {
    let mapped = mapping.upstream_partitions(
        graph.partitions_def(&candidate.asset_key),
        candidate.partition_key.as_deref(),
        graph.partitions_def(parent),
    )?;
    let same_run = same_run_shape(graph, parent, &candidate.asset_key);

    let is_satisfied =
        |ap: &AssetPartition| materialized.contains(ap) || (same_run && to_request.contains(ap));

    Ok(match mapped {
        MappedPartitions::All => target.for_asset(parent).all(is_satisfied),
        MappedPartitions::Keys(keys) => keys
            .into_iter()
            .map(|key| AssetPartition::new(parent.clone(), key))
            .filter(|ap| target.contains(ap))
            .all(|ap| is_satisfied(&ap)),
    })
}
