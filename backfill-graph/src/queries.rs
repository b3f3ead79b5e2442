//! Graph query operations
//!
//! This module provides traversal queries over the asset graph:
//! - Ancestors and descendants with depth
//! - Closure of a selection over its descendants
//! - Longest dependency chain, which bounds how many rounds failure
//!   propagation can take

use crate::graph::AssetGraph;
use backfill_core::AssetKey;
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Query builder for graph traversals
pub struct GraphQuery<'a> {
    graph: &'a AssetGraph,
}

impl<'a> GraphQuery<'a> {
    /// Create a new query for the given graph
    pub fn new(graph: &'a AssetGraph) -> Self {
        Self { graph }
    }

    /// Find all ancestors (upstream) up to a maximum depth
    ///
    /// A depth of 1 returns direct parents, 2 includes grandparents, and so on.
    /// `None` traverses without limit. Results are sorted by depth, closest first.
    pub fn ancestors_with_depth(
        &self,
        key: &AssetKey,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        self.traverse_with_depth(key, Direction::Incoming, max_depth)
    }

    /// Find all descendants (downstream) up to a maximum depth
    pub fn descendants_with_depth(
        &self,
        key: &AssetKey,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        self.traverse_with_depth(key, Direction::Outgoing, max_depth)
    }

    /// `keys` plus every asset downstream of them
    pub fn with_descendants<'k, I>(&self, keys: I) -> BTreeSet<AssetKey>
    where
        I: IntoIterator<Item = &'k AssetKey>,
    {
        let mut closure = BTreeSet::new();
        for key in keys {
            closure.insert(key.clone());
            closure.extend(
                self.descendants_with_depth(key, None)
                    .into_iter()
                    .map(|(key, _)| key),
            );
        }
        closure
    }

    /// Number of edges on the longest dependency chain in the graph
    pub fn longest_path_len(&self) -> usize {
        let mut longest: Vec<usize> = vec![0; self.graph.node_count()];
        let graph = self.graph.inner_graph();

        for key in self.graph.toposorted_keys() {
            let Some(idx) = self.graph.node_index(key) else {
                continue;
            };
            let here = longest[idx.index()];
            for child in graph.neighbors_directed(idx, Direction::Outgoing) {
                let entry = &mut longest[child.index()];
                *entry = (*entry).max(here + 1);
            }
        }

        longest.into_iter().max().unwrap_or(0)
    }

    fn traverse_with_depth(
        &self,
        start: &AssetKey,
        direction: Direction,
        max_depth: Option<usize>,
    ) -> Vec<(AssetKey, usize)> {
        let graph = self.graph.inner_graph();

        let start_idx = match self.graph.node_index(start) {
            Some(idx) => idx,
            None => return Vec::new(),
        };

        let mut result = Vec::new();
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, usize)> = VecDeque::new();

        visited.insert(start_idx);
        queue.push_back((start_idx, 0));

        while let Some((node_idx, depth)) = queue.pop_front() {
            if depth > 0 {
                result.push((graph[node_idx].key.clone(), depth));
            }

            if max_depth.map(|max| depth < max).unwrap_or(true) {
                for neighbor in graph.neighbors_directed(node_idx, direction) {
                    if visited.insert(neighbor) {
                        queue.push_back((neighbor, depth + 1));
                    }
                }
            }
        }

        result
    }
}
