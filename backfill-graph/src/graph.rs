//! Asset dependency graph data structure

use crate::Error;
use backfill_core::{
    infer_mapping, AssetDefinition, AssetKey, BackfillPolicy, PartitionMapping,
    PartitionsDefinition,
};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Node in the asset graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetNode {
    pub key: AssetKey,
    pub description: Option<String>,
    pub partitions_def: Option<PartitionsDefinition>,
    pub backfill_policy: Option<BackfillPolicy>,
}

/// Edge from a parent asset to a child asset
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub mapping: PartitionMapping,
}

/// Serialized form of a graph: the asset definitions it is built from
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub assets: Vec<AssetDefinition>,
}

/// Immutable, acyclic asset dependency graph
///
/// Edges point from parent to child. The topological order is computed once
/// at construction and breaks ties by declaration order, so it is stable for
/// a given list of definitions.
#[derive(Debug, Clone)]
pub struct AssetGraph {
    graph: DiGraph<AssetNode, DependencyEdge>,
    key_to_node: HashMap<AssetKey, NodeIndex>,
    topo_order: Vec<AssetKey>,
    topo_position: HashMap<AssetKey, usize>,
}

impl AssetGraph {
    /// Build a graph from asset definitions
    ///
    /// Fails on duplicate keys, dependencies on undeclared assets, cycles, and
    /// edges whose partitions definitions cannot be mapped onto each other.
    pub fn from_definitions<I>(definitions: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = AssetDefinition>,
    {
        let definitions: Vec<AssetDefinition> = definitions.into_iter().collect();
        let mut graph = DiGraph::with_capacity(definitions.len(), definitions.len());
        let mut key_to_node = HashMap::with_capacity(definitions.len());

        for def in &definitions {
            if key_to_node.contains_key(&def.key) {
                return Err(Error::DuplicateAsset(def.key.to_string()));
            }
            let idx = graph.add_node(AssetNode {
                key: def.key.clone(),
                description: def.description.clone(),
                partitions_def: def.partitions_def.clone(),
                backfill_policy: def.backfill_policy,
            });
            key_to_node.insert(def.key.clone(), idx);
        }

        for def in &definitions {
            let child_idx = key_to_node[&def.key];
            for upstream in &def.deps {
                let parent_idx =
                    *key_to_node
                        .get(upstream)
                        .ok_or_else(|| Error::MissingDependency {
                            asset: def.key.to_string(),
                            missing: upstream.to_string(),
                        })?;
                let parent: &AssetNode = &graph[parent_idx];
                let mapping =
                    infer_mapping(parent.partitions_def.as_ref(), def.partitions_def.as_ref())
                        .map_err(|source| Error::IncompatiblePartitions {
                            upstream: upstream.to_string(),
                            downstream: def.key.to_string(),
                            source,
                        })?;
                graph.add_edge(parent_idx, child_idx, DependencyEdge { mapping });
            }
        }

        let topo_order = topological_sort(&graph)?;
        let topo_position = topo_order
            .iter()
            .enumerate()
            .map(|(pos, key)| (key.clone(), pos))
            .collect();

        debug!(
            assets = graph.node_count(),
            edges = graph.edge_count(),
            "Built asset graph"
        );

        Ok(Self {
            graph,
            key_to_node,
            topo_order,
            topo_position,
        })
    }

    /// Build a graph from its serialized definition
    pub fn from_definition(definition: GraphDefinition) -> Result<Self, Error> {
        Self::from_definitions(definition.assets)
    }

    /// Whether the graph contains `key`
    pub fn contains(&self, key: &AssetKey) -> bool {
        self.key_to_node.contains_key(key)
    }

    /// Node for `key`
    pub fn node(&self, key: &AssetKey) -> Option<&AssetNode> {
        self.key_to_node.get(key).map(|&idx| &self.graph[idx])
    }

    /// Node for `key`, or a not-found error
    pub fn require_node(&self, key: &AssetKey) -> Result<&AssetNode, Error> {
        self.node(key)
            .ok_or_else(|| Error::NodeNotFound(key.to_string()))
    }

    /// Partitions definition of `key`, `None` when unpartitioned or unknown
    pub fn partitions_def(&self, key: &AssetKey) -> Option<&PartitionsDefinition> {
        self.node(key).and_then(|node| node.partitions_def.as_ref())
    }

    /// Backfill policy of `key`, `None` when it declares none or is unknown
    pub fn backfill_policy(&self, key: &AssetKey) -> Option<BackfillPolicy> {
        self.node(key).and_then(|node| node.backfill_policy)
    }

    /// Whether `key` is partitioned
    pub fn is_partitioned(&self, key: &AssetKey) -> bool {
        self.partitions_def(key).is_some()
    }

    /// Direct parents of `key` with the mapping of each edge, in topological order
    pub fn parents(&self, key: &AssetKey) -> Vec<(&AssetKey, PartitionMapping)> {
        self.neighbors(key, Direction::Incoming)
    }

    /// Direct children of `key` with the mapping of each edge, in topological order
    pub fn children(&self, key: &AssetKey) -> Vec<(&AssetKey, PartitionMapping)> {
        self.neighbors(key, Direction::Outgoing)
    }

    fn neighbors(&self, key: &AssetKey, direction: Direction) -> Vec<(&AssetKey, PartitionMapping)> {
        let Some(&idx) = self.key_to_node.get(key) else {
            return Vec::new();
        };
        let mut neighbors: Vec<_> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Incoming => edge.source(),
                    Direction::Outgoing => edge.target(),
                };
                (&self.graph[other].key, edge.weight().mapping)
            })
            .collect();
        neighbors.sort_by_key(|(key, _)| self.topo_position.get(*key).copied());
        neighbors
    }

    /// All asset keys in topological order
    pub fn toposorted_keys(&self) -> &[AssetKey] {
        &self.topo_order
    }

    /// Position of `key` in the topological order
    pub fn topological_position(&self, key: &AssetKey) -> Option<usize> {
        self.topo_position.get(key).copied()
    }

    /// Get the total number of nodes
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get the total number of edges
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn node_index(&self, key: &AssetKey) -> Option<NodeIndex> {
        self.key_to_node.get(key).copied()
    }

    pub(crate) fn inner_graph(&self) -> &DiGraph<AssetNode, DependencyEdge> {
        &self.graph
    }
}

/// Kahn's algorithm, always emitting the earliest-declared ready node next
fn topological_sort(graph: &DiGraph<AssetNode, DependencyEdge>) -> Result<Vec<AssetKey>, Error> {
    let mut indegree: Vec<usize> = graph
        .node_indices()
        .map(|idx| graph.neighbors_directed(idx, Direction::Incoming).count())
        .collect();

    let mut ready: BTreeSet<NodeIndex> = graph
        .node_indices()
        .filter(|idx| indegree[idx.index()] == 0)
        .collect();

    let mut ordered = Vec::with_capacity(graph.node_count());

    while let Some(idx) = ready.pop_first() {
        ordered.push(graph[idx].key.clone());

        for child in graph.neighbors_directed(idx, Direction::Outgoing) {
            let entry = &mut indegree[child.index()];
            *entry -= 1;
            if *entry == 0 {
                ready.insert(child);
            }
        }
    }

    if ordered.len() != graph.node_count() {
        return Err(Error::CircularDependency);
    }

    Ok(ordered)
}
