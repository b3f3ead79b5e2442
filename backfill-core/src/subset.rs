//! Ordered sets of asset-partitions

use crate::asset::{AssetKey, AssetPartition};
use serde::{Deserialize, Serialize};
use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};

/// Ordered set of asset-partitions
///
/// Iteration order is by asset key, then partition key. Per-asset lookups use
/// a range scan, which relies on the unpartitioned sentinel sorting first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetPartitionSubset {
    inner: BTreeSet<AssetPartition>,
}

impl AssetPartitionSubset {
    /// Create an empty subset
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of asset-partitions
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the subset is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Whether the subset contains `asset_partition`
    pub fn contains(&self, asset_partition: &AssetPartition) -> bool {
        self.inner.contains(asset_partition)
    }

    /// Insert an asset-partition, returning whether it was newly added
    pub fn insert(&mut self, asset_partition: AssetPartition) -> bool {
        self.inner.insert(asset_partition)
    }

    /// Iterate in asset key, partition key order
    pub fn iter(&self) -> btree_set::Iter<'_, AssetPartition> {
        self.inner.iter()
    }

    /// Asset-partitions belonging to `asset_key`
    pub fn for_asset<'a>(
        &'a self,
        asset_key: &'a AssetKey,
    ) -> impl Iterator<Item = &'a AssetPartition> + 'a {
        self.inner
            .range(AssetPartition::unpartitioned(asset_key.clone())..)
            .take_while(move |ap| &ap.asset_key == asset_key)
    }

    /// Number of asset-partitions belonging to `asset_key`
    pub fn count_for_asset(&self, asset_key: &AssetKey) -> usize {
        self.for_asset(asset_key).count()
    }

    /// Distinct asset keys present in the subset
    pub fn asset_keys(&self) -> BTreeSet<AssetKey> {
        self.inner.iter().map(|ap| ap.asset_key.clone()).collect()
    }

    /// Asset-partitions grouped by asset key
    pub fn by_asset(&self) -> BTreeMap<&AssetKey, Vec<&AssetPartition>> {
        let mut grouped: BTreeMap<&AssetKey, Vec<&AssetPartition>> = BTreeMap::new();
        for ap in &self.inner {
            grouped.entry(&ap.asset_key).or_default().push(ap);
        }
        grouped
    }

    /// Union of two subsets
    pub fn union(&self, other: &Self) -> Self {
        self.inner.union(&other.inner).cloned().collect()
    }

    /// Asset-partitions in `self` but not in `other`
    pub fn difference(&self, other: &Self) -> Self {
        self.inner.difference(&other.inner).cloned().collect()
    }

    /// Asset-partitions present in both subsets
    pub fn intersection(&self, other: &Self) -> Self {
        self.inner.intersection(&other.inner).cloned().collect()
    }

    /// Whether every element of `self` is in `other`
    pub fn is_subset(&self, other: &Self) -> bool {
        self.inner.is_subset(&other.inner)
    }

    /// Whether the two subsets share no element
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.inner.is_disjoint(&other.inner)
    }
}

impl FromIterator<AssetPartition> for AssetPartitionSubset {
    fn from_iter<I: IntoIterator<Item = AssetPartition>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

impl Extend<AssetPartition> for AssetPartitionSubset {
    fn extend<I: IntoIterator<Item = AssetPartition>>(&mut self, iter: I) {
        self.inner.extend(iter);
    }
}

impl IntoIterator for AssetPartitionSubset {
    type Item = AssetPartition;
    type IntoIter = btree_set::IntoIter<AssetPartition>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.into_iter()
    }
}

impl<'a> IntoIterator for &'a AssetPartitionSubset {
    type Item = &'a AssetPartition;
    type IntoIter = btree_set::Iter<'a, AssetPartition>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}
