//! Asset definitions and identities
//!
//! Assets are named, declaratively defined data-producing nodes. An asset may
//! be partitioned, in which case each partition is an independently
//! materializable slice identified by a key from the asset's partitions
//! definition. This module provides the asset identity types and the
//! declarative definition consumed when building the dependency graph.

use crate::partitions::PartitionsDefinition;
use crate::policy::BackfillPolicy;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of an asset
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetKey(String);

impl AssetKey {
    /// Create an asset key
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for AssetKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// The atomic unit of backfill work: one asset, one partition
///
/// Unpartitioned assets use `partition_key: None`. Ordering is by asset key
/// first, with the unpartitioned sentinel sorting before any partition key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetPartition {
    pub asset_key: AssetKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
}

impl AssetPartition {
    /// Asset-partition for an unpartitioned asset
    pub fn unpartitioned(asset_key: impl Into<AssetKey>) -> Self {
        Self {
            asset_key: asset_key.into(),
            partition_key: None,
        }
    }

    /// Asset-partition for a single partition key
    pub fn partitioned(asset_key: impl Into<AssetKey>, partition_key: impl Into<String>) -> Self {
        Self {
            asset_key: asset_key.into(),
            partition_key: Some(partition_key.into()),
        }
    }

    /// Asset-partition from an optional key
    pub fn new(asset_key: impl Into<AssetKey>, partition_key: Option<String>) -> Self {
        Self {
            asset_key: asset_key.into(),
            partition_key,
        }
    }
}

impl fmt::Display for AssetPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.partition_key {
            Some(key) => write!(f, "{}[{}]", self.asset_key, key),
            None => write!(f, "{}", self.asset_key),
        }
    }
}

/// Declarative definition of an asset, as loaded into the dependency graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDefinition {
    /// Asset identity
    pub key: AssetKey,

    /// Description of the asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Partition key space, `None` for unpartitioned assets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partitions_def: Option<PartitionsDefinition>,

    /// Batching rule for backfills of this asset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backfill_policy: Option<BackfillPolicy>,

    /// Upstream assets this asset reads from
    #[serde(default)]
    pub deps: Vec<AssetKey>,
}

impl AssetDefinition {
    /// Create an unpartitioned definition with no policy and no dependencies
    pub fn new(key: impl Into<AssetKey>) -> Self {
        Self {
            key: key.into(),
            description: None,
            partitions_def: None,
            backfill_policy: None,
            deps: Vec::new(),
        }
    }

    /// Create a builder for constructing a definition with a fluent API
    pub fn builder(key: impl Into<AssetKey>) -> AssetDefinitionBuilder {
        AssetDefinitionBuilder::new(key)
    }

    /// Add a dependency on another asset
    pub fn add_dependency(&mut self, upstream: impl Into<AssetKey>) {
        let upstream = upstream.into();
        // Prevent duplicates to keep the graph's edge set clean.
        if !self.deps.contains(&upstream) {
            self.deps.push(upstream);
        }
    }

    /// Whether the asset is partitioned
    pub fn is_partitioned(&self) -> bool {
        self.partitions_def.is_some()
    }
}

/// Builder for constructing asset definitions with a fluent API
pub struct AssetDefinitionBuilder {
    definition: AssetDefinition,
}

impl AssetDefinitionBuilder {
    /// Create a new asset definition builder
    pub fn new(key: impl Into<AssetKey>) -> Self {
        Self {
            definition: AssetDefinition::new(key),
        }
    }

    /// Set the asset description
    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.definition.description = Some(desc.into());
        self
    }

    /// Set the partitions definition
    pub fn partitions(mut self, partitions_def: PartitionsDefinition) -> Self {
        self.definition.partitions_def = Some(partitions_def);
        self
    }

    /// Set daily partitioning starting at `start`
    pub fn partitioned_daily(self, start: NaiveDate) -> Self {
        self.partitions(PartitionsDefinition::daily(start))
    }

    /// Set weekly partitioning starting at `start`
    pub fn partitioned_weekly(self, start: NaiveDate) -> Self {
        self.partitions(PartitionsDefinition::weekly(start))
    }

    /// Set hourly partitioning starting at `start`
    pub fn partitioned_hourly(self, start: NaiveDate) -> Self {
        self.partitions(PartitionsDefinition::hourly(start))
    }

    /// Set the backfill policy
    pub fn backfill_policy(mut self, policy: BackfillPolicy) -> Self {
        self.definition.backfill_policy = Some(policy);
        self
    }

    /// Use a single-run backfill policy
    pub fn single_run(self) -> Self {
        self.backfill_policy(BackfillPolicy::single_run())
    }

    /// Add a dependency on another asset
    pub fn depends_on(mut self, upstream: impl Into<AssetKey>) -> Self {
        self.definition.add_dependency(upstream);
        self
    }

    /// Build the asset definition
    pub fn build(self) -> AssetDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_partition_ordering() {
        let mut partitions = vec![
            AssetPartition::partitioned("b", "2023-01-02"),
            AssetPartition::partitioned("a", "2023-01-02"),
            AssetPartition::unpartitioned("b"),
            AssetPartition::partitioned("a", "2023-01-01"),
        ];
        partitions.sort();

        assert_eq!(partitions[0], AssetPartition::partitioned("a", "2023-01-01"));
        assert_eq!(partitions[1], AssetPartition::partitioned("a", "2023-01-02"));
        assert_eq!(partitions[2], AssetPartition::unpartitioned("b"));
        assert_eq!(partitions[3], AssetPartition::partitioned("b", "2023-01-02"));
    }

    #[test]
    fn test_asset_partition_display() {
        assert_eq!(
            AssetPartition::partitioned("orders", "2023-01-01").to_string(),
            "orders[2023-01-01]"
        );
        assert_eq!(AssetPartition::unpartitioned("orders").to_string(), "orders");
    }

    #[test]
    fn test_builder_sets_fields() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let asset = AssetDefinition::builder("daily_orders")
            .description("Orders by day")
            .partitioned_daily(start)
            .single_run()
            .depends_on("raw_orders")
            .depends_on("raw_orders")
            .build();

        assert_eq!(asset.key, AssetKey::new("daily_orders"));
        assert_eq!(asset.description.as_deref(), Some("Orders by day"));
        assert_eq!(asset.partitions_def, Some(PartitionsDefinition::daily(start)));
        assert_eq!(asset.backfill_policy, Some(BackfillPolicy::SingleRun));
        assert_eq!(asset.deps, vec![AssetKey::new("raw_orders")]);
        assert!(asset.is_partitioned());
    }

    #[test]
    fn test_definition_defaults_from_json() {
        let asset: AssetDefinition = serde_json::from_str(r#"{"key":"raw"}"#).unwrap();
        assert_eq!(asset, AssetDefinition::new("raw"));
        assert!(!asset.is_partitioned());
    }
}
