//! Outcome folding and failure contagion
//!
//! Observed outcomes are folded into the materialized and failed sets, then
//! failures spread to every targeted descendant. Parents outside the target
//! never propagate failure.

use crate::backfill_data::AssetBackfillData;
use crate::iteration::ObservedOutcomes;
use crate::{Error, Result};
use backfill_core::{AssetPartition, AssetPartitionSubset, MappedPartitions};
use backfill_graph::{AssetGraph, GraphQuery};
use tracing::{debug, warn};

/// Fold observed outcomes into copies of the materialized and failed sets
///
/// Materializations are applied first. Outcomes outside the target are
/// ignored, and an asset-partition that already has a final status keeps it.
pub fn fold_outcomes(
    data: &AssetBackfillData,
    outcomes: &ObservedOutcomes,
) -> (AssetPartitionSubset, AssetPartitionSubset) {
    let target = data.target_subset();
    let mut materialized = data.materialized_subset().clone();
    let mut failed = data.failed_and_downstream_subset().clone();

    for ap in outcomes.materialized.iter() {
        if !target.contains(ap) {
            debug!(asset_partition = %ap, "Ignoring materialization outside the target");
        } else if failed.contains(ap) {
            warn!(asset_partition = %ap, "Ignoring materialization of a failed asset-partition");
        } else {
            materialized.insert(ap.clone());
        }
    }

    for ap in outcomes.failed.iter() {
        if !target.contains(ap) {
            debug!(asset_partition = %ap, "Ignoring failure outside the target");
        } else if materialized.contains(ap) {
            warn!(asset_partition = %ap, "Ignoring failure of a materialized asset-partition");
        } else {
            failed.insert(ap.clone());
        }
    }

    (materialized, failed)
}

/// Mark every targeted descendant of a failed asset-partition as failed
///
/// Runs to a fixpoint. Each round moves one dependency hop, so the number of
/// rounds is bounded by the longest path in the graph.
pub fn propagate_failures(
    graph: &AssetGraph,
    target: &AssetPartitionSubset,
    materialized: &AssetPartitionSubset,
    failed: &mut AssetPartitionSubset,
) -> Result<usize> {
    let max_rounds = GraphQuery::new(graph).longest_path_len() + 1;
    let mut frontier: Vec<AssetPartition> = failed.iter().cloned().collect();
    let mut rounds = 0;
    let mut newly_failed = 0;

    while !frontier.is_empty() {
        if rounds >= max_rounds {
            return Err(Error::Internal(format!(
                "failure propagation did not converge after {rounds} rounds"
            )));
        }
        rounds += 1;

        let mut next = Vec::new();
        for ap in &frontier {
            for (child, mapping) in graph.children(&ap.asset_key) {
                if target.count_for_asset(child) == 0 {
                    continue;
                }
                let mapped = mapping.downstream_partitions(
                    graph.partitions_def(&ap.asset_key),
                    ap.partition_key.as_deref(),
                    graph.partitions_def(child),
                )?;
                let candidates: Vec<AssetPartition> = match mapped {
                    MappedPartitions::All => target.for_asset(child).cloned().collect(),
                    MappedPartitions::Keys(keys) => keys
                        .into_iter()
                        .map(|key| AssetPartition::new(child.clone(), key))
                        .filter(|candidate| target.contains(candidate))
                        .collect(),
                };
                for candidate in candidates {
                    if !materialized.contains(&candidate) && failed.insert(candidate.clone()) {
                        next.push(candidate);
                    }
                }
            }
        }

        newly_failed += next.len();
        frontier = next;
    }

    if newly_failed > 0 {
        debug!(newly_failed, rounds, "Propagated failures downstream");
    }
    Ok(newly_failed)
}
