//! Grouping of requestable asset-partitions into run requests
//!
//! Assets requested in the same iteration merge into one run group when they
//! are linked by a dependency edge and share both the backfill policy and the
//! partitions definition. Merging is transitive, so a chain of equal assets
//! forms a single group. Each group is then batched according to its policy.

use crate::run_request::{PartitionKeyRange, RunRequest};
use crate::{Error, Result};
use backfill_core::{AssetKey, AssetPartitionSubset, BackfillPolicy, PartitionsDefinition};
use backfill_graph::AssetGraph;
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Assets batched together, in topological order
#[derive(Debug, Clone, PartialEq)]
pub struct RunGroup {
    pub assets: Vec<AssetKey>,
    pub backfill_policy: Option<BackfillPolicy>,
    pub partitions_def: Option<PartitionsDefinition>,
}

/// Whether `a` and `b` may share a run
pub fn same_run_shape(graph: &AssetGraph, a: &AssetKey, b: &AssetKey) -> bool {
    graph.backfill_policy(a) == graph.backfill_policy(b)
        && graph.partitions_def(a) == graph.partitions_def(b)
}

/// Partition the assets of `to_request` into run groups
///
/// Groups are ordered by the topological position of their first asset.
pub fn group_assets(graph: &AssetGraph, to_request: &AssetPartitionSubset) -> Result<Vec<RunGroup>> {
    let mut assets: Vec<AssetKey> = to_request.asset_keys().into_iter().collect();
    for key in &assets {
        graph.require_node(key)?;
    }
    assets.sort_by_key(|key| graph.topological_position(key));

    let index: HashMap<&AssetKey, usize> = assets.iter().enumerate().map(|(i, k)| (k, i)).collect();
    let mut sets = DisjointSets::new(assets.len());

    for (child_idx, child) in assets.iter().enumerate() {
        for (parent, _) in graph.parents(child) {
            if let Some(&parent_idx) = index.get(parent) {
                if same_run_shape(graph, parent, child) {
                    sets.union(parent_idx, child_idx);
                }
            }
        }
    }

    let mut group_of_root: HashMap<usize, usize> = HashMap::new();
    let mut groups: Vec<RunGroup> = Vec::new();
    for (idx, key) in assets.iter().enumerate() {
        let root = sets.find(idx);
        let group_idx = *group_of_root.entry(root).or_insert_with(|| {
            groups.push(RunGroup {
                assets: Vec::new(),
                backfill_policy: graph.backfill_policy(key),
                partitions_def: graph.partitions_def(key).cloned(),
            });
            groups.len() - 1
        });
        groups[group_idx].assets.push(key.clone());
    }

    Ok(groups)
}

/// Build the run requests for every asset-partition in `to_request`
pub fn build_run_requests(
    backfill_id: &str,
    graph: &AssetGraph,
    to_request: &AssetPartitionSubset,
) -> Result<Vec<RunRequest>> {
    let mut run_requests = Vec::new();
    for group in group_assets(graph, to_request)? {
        let requests = requests_for_group(backfill_id, &group, to_request)?;
        debug!(
            assets = ?group.assets,
            policy = %policy_label(group.backfill_policy),
            runs = requests.len(),
            "Grouped run requests"
        );
        run_requests.extend(requests);
    }
    Ok(run_requests)
}

fn requests_for_group(
    backfill_id: &str,
    group: &RunGroup,
    to_request: &AssetPartitionSubset,
) -> Result<Vec<RunRequest>> {
    if group.assets.is_empty() {
        return Err(Error::Internal("empty run group".to_string()));
    }

    let Some(partitions_def) = &group.partitions_def else {
        return Ok(vec![RunRequest::unpartitioned(
            backfill_id,
            group.assets.clone(),
        )]);
    };

    let keys_by_asset: Vec<(&AssetKey, BTreeSet<&str>)> = group
        .assets
        .iter()
        .map(|key| {
            let keys = to_request
                .for_asset(key)
                .filter_map(|ap| ap.partition_key.as_deref())
                .collect();
            (key, keys)
        })
        .collect();

    let all_keys: BTreeSet<&str> = keys_by_asset
        .iter()
        .flat_map(|(_, keys)| keys.iter().copied())
        .collect();
    let ordered = partitions_def.sort_keys(all_keys)?;
    if ordered.is_empty() {
        return Err(Error::Internal(format!(
            "run group {:?} has no partition keys",
            group.assets
        )));
    }

    let selection_for = |chunk: &[String]| -> Vec<AssetKey> {
        keys_by_asset
            .iter()
            .filter(|(_, keys)| chunk.iter().any(|k| keys.contains(k.as_str())))
            .map(|(key, _)| (*key).clone())
            .collect()
    };

    let requests = match group.backfill_policy {
        Some(BackfillPolicy::SingleRun) => vec![RunRequest::for_range(
            backfill_id,
            group.assets.clone(),
            range_of(&ordered)?,
        )],
        Some(BackfillPolicy::MultiRun {
            max_partitions_per_run,
        }) => {
            let chunk_size = usize::try_from(max_partitions_per_run.get())
                .map_err(|e| Error::Internal(e.to_string()))?;
            ordered
                .chunks(chunk_size)
                .map(|chunk| {
                    Ok(RunRequest::for_range(
                        backfill_id,
                        selection_for(chunk),
                        range_of(chunk)?,
                    ))
                })
                .collect::<Result<Vec<_>>>()?
        }
        None => ordered
            .iter()
            .map(|key| {
                RunRequest::for_partition(
                    backfill_id,
                    selection_for(std::slice::from_ref(key)),
                    key.clone(),
                )
            })
            .collect(),
    };

    Ok(requests)
}

fn policy_label(policy: Option<BackfillPolicy>) -> String {
    policy.map_or_else(|| "none".to_string(), |p| p.to_string())
}

fn range_of(keys: &[String]) -> Result<PartitionKeyRange> {
    match (keys.first(), keys.last()) {
        (Some(start), Some(end)) => Ok(PartitionKeyRange {
            start: start.clone(),
            end: end.clone(),
        }),
        _ => Err(Error::Internal("empty partition chunk".to_string())),
    }
}

/// Union-find over asset indices
struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, idx: usize) -> usize {
        let mut root = idx;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut current = idx;
        while self.parent[current] != root {
            let next = self.parent[current];
            self.parent[current] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            // Keep the earlier asset as the root
            let (low, high) = (root_a.min(root_b), root_a.max(root_b));
            self.parent[high] = low;
        }
    }
}
