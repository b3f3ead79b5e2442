//! Run requests handed to the execution engine

use crate::Result;
use backfill_core::{AssetKey, AssetPartition};
use backfill_graph::AssetGraph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag carrying the backfill identifier, present on every request
pub const BACKFILL_ID_TAG: &str = "backfill/backfill_id";

/// Tag carrying the single partition key of a per-partition request
pub const PARTITION_TAG: &str = "backfill/partition";

/// Tag carrying the first key of a partition range request
pub const ASSET_PARTITION_RANGE_START_TAG: &str = "backfill/asset_partition_range_start";

/// Tag carrying the last key of a partition range request
pub const ASSET_PARTITION_RANGE_END_TAG: &str = "backfill/asset_partition_range_end";

/// Inclusive range of partition keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionKeyRange {
    pub start: String,
    pub end: String,
}

/// Executable unit of work: one run materializing one or more assets
///
/// All selected assets share one partitions definition, so a partition key or
/// range applies to each of them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub asset_selection: Vec<AssetKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_range: Option<PartitionKeyRange>,
    pub tags: BTreeMap<String, String>,
}

impl RunRequest {
    /// Request for unpartitioned assets; carries only the backfill tag
    pub fn unpartitioned(backfill_id: &str, asset_selection: Vec<AssetKey>) -> Self {
        Self {
            asset_selection,
            partition_key: None,
            partition_range: None,
            tags: backfill_tags(backfill_id),
        }
    }

    /// Request for a single partition key
    pub fn for_partition(
        backfill_id: &str,
        asset_selection: Vec<AssetKey>,
        partition_key: impl Into<String>,
    ) -> Self {
        let partition_key = partition_key.into();
        let mut tags = backfill_tags(backfill_id);
        tags.insert(PARTITION_TAG.to_string(), partition_key.clone());
        Self {
            asset_selection,
            partition_key: Some(partition_key),
            partition_range: None,
            tags,
        }
    }

    /// Request for an inclusive partition key range
    pub fn for_range(
        backfill_id: &str,
        asset_selection: Vec<AssetKey>,
        range: PartitionKeyRange,
    ) -> Self {
        let mut tags = backfill_tags(backfill_id);
        tags.insert(
            ASSET_PARTITION_RANGE_START_TAG.to_string(),
            range.start.clone(),
        );
        tags.insert(ASSET_PARTITION_RANGE_END_TAG.to_string(), range.end.clone());
        Self {
            asset_selection,
            partition_key: None,
            partition_range: Some(range),
            tags,
        }
    }

    /// Backfill this request belongs to
    pub fn backfill_id(&self) -> Option<&str> {
        self.tags.get(BACKFILL_ID_TAG).map(String::as_str)
    }

    /// Value of a tag
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Every asset-partition the request covers
    ///
    /// Ranges are expanded through each selected asset's partitions definition.
    pub fn asset_partitions(&self, graph: &AssetGraph) -> Result<Vec<AssetPartition>> {
        let mut covered = Vec::new();
        for key in &self.asset_selection {
            match (&self.partition_key, &self.partition_range) {
                (Some(partition_key), _) => {
                    covered.push(AssetPartition::partitioned(key.clone(), partition_key.clone()));
                }
                (None, Some(range)) => {
                    let partitions_def = graph.partitions_def(key).ok_or_else(|| {
                        crate::Error::GraphInconsistency(format!(
                            "range request selects unpartitioned asset {key}"
                        ))
                    })?;
                    covered.extend(
                        partitions_def
                            .keys_in_range(&range.start, &range.end)?
                            .into_iter()
                            .map(|pk| AssetPartition::partitioned(key.clone(), pk)),
                    );
                }
                (None, None) => covered.push(AssetPartition::unpartitioned(key.clone())),
            }
        }
        Ok(covered)
    }
}

fn backfill_tags(backfill_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(BACKFILL_ID_TAG.to_string(), backfill_id.to_string())])
}

#[cfg(test)]
mod tests {
    use super::*;
    use backfill_core::AssetDefinition;
    use chrono::NaiveDate;

    #[test]
    fn test_unpartitioned_request_only_carries_backfill_tag() {
        let request = RunRequest::unpartitioned("bf-1", vec![AssetKey::new("root")]);
        assert_eq!(request.tags.len(), 1);
        assert_eq!(request.backfill_id(), Some("bf-1"));
        assert!(request.tag(ASSET_PARTITION_RANGE_START_TAG).is_none());
    }

    #[test]
    fn test_range_request_expands_through_definition() {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        let graph = AssetGraph::from_definitions(vec![
            AssetDefinition::builder("a").partitioned_daily(start).build(),
            AssetDefinition::builder("b")
                .partitioned_daily(start)
                .depends_on("a")
                .build(),
        ])
        .unwrap();

        let request = RunRequest::for_range(
            "bf-1",
            vec![AssetKey::new("a"), AssetKey::new("b")],
            PartitionKeyRange {
                start: "2023-01-01".to_string(),
                end: "2023-01-03".to_string(),
            },
        );
        assert_eq!(request.tag(ASSET_PARTITION_RANGE_START_TAG), Some("2023-01-01"));
        assert_eq!(request.tag(ASSET_PARTITION_RANGE_END_TAG), Some("2023-01-03"));

        let covered = request.asset_partitions(&graph).unwrap();
        assert_eq!(covered.len(), 6);
        assert!(covered.contains(&AssetPartition::partitioned("b", "2023-01-02")));
    }

    #[test]
    fn test_partition_request_tags() {
        let request = RunRequest::for_partition("bf-1", vec![AssetKey::new("a")], "2023-01-05");
        assert_eq!(request.partition_key.as_deref(), Some("2023-01-05"));
        assert_eq!(request.tag(PARTITION_TAG), Some("2023-01-05"));
        assert!(request.partition_range.is_none());
    }
}
