//! Partition mappings between dependent assets
//!
//! A mapping answers "which partitions of the other asset does this partition
//! relate to" for one dependency edge. Mappings are inferred from the two
//! partitions definitions and are symmetric: the same overlap rule is used
//! when walking upstream and downstream.

use crate::partitions::{PartitionError, PartitionsDefinition, TimeGranularity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error types for partition mapping operations
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum PartitionMappingError {
    #[error("Cannot map partitions from {upstream} to {downstream}")]
    IncompatibleTypes { upstream: String, downstream: String },

    #[error("Partition key required to map between time windows")]
    MissingPartitionKey,

    #[error(transparent)]
    Partition(#[from] PartitionError),
}

/// How partitions of a parent relate to partitions of a child
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionMapping {
    /// Same key on both sides
    Identity,

    /// Keys relate when their time windows overlap
    TimeWindow,

    /// Every partition on one side relates to every partition on the other
    AllPartitions,
}

/// Result of mapping one partition across an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedPartitions {
    /// Explicit partition keys, `None` for an unpartitioned asset
    Keys(Vec<Option<String>>),

    /// Every partition of the other asset
    All,
}

impl MappedPartitions {
    /// Whether `partition_key` is covered by this mapping result
    pub fn contains(&self, partition_key: Option<&str>) -> bool {
        match self {
            MappedPartitions::All => true,
            MappedPartitions::Keys(keys) => keys.iter().any(|k| k.as_deref() == partition_key),
        }
    }
}

impl fmt::Display for PartitionMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionMapping::Identity => write!(f, "identity"),
            PartitionMapping::TimeWindow => write!(f, "time_window"),
            PartitionMapping::AllPartitions => write!(f, "all_partitions"),
        }
    }
}

/// Infer the mapping for an edge from the parent and child definitions
pub fn infer_mapping(
    upstream: Option<&PartitionsDefinition>,
    downstream: Option<&PartitionsDefinition>,
) -> Result<PartitionMapping, PartitionMappingError> {
    match (upstream, downstream) {
        (None, None) => Ok(PartitionMapping::Identity),
        (Some(_), None) | (None, Some(_)) => Ok(PartitionMapping::AllPartitions),
        (Some(up), Some(down)) if up == down => Ok(PartitionMapping::Identity),
        (Some(PartitionsDefinition::TimeWindow(_)), Some(PartitionsDefinition::TimeWindow(_))) => {
            Ok(PartitionMapping::TimeWindow)
        }
        (Some(up), Some(down)) => Err(PartitionMappingError::IncompatibleTypes {
            upstream: describe(Some(up)),
            downstream: describe(Some(down)),
        }),
    }
}

impl PartitionMapping {
    /// Child partitions that depend on `upstream_key` of the parent
    pub fn downstream_partitions(
        &self,
        upstream_def: Option<&PartitionsDefinition>,
        upstream_key: Option<&str>,
        downstream_def: Option<&PartitionsDefinition>,
    ) -> Result<MappedPartitions, PartitionMappingError> {
        self.map_key(upstream_def, upstream_key, downstream_def)
    }

    /// Parent partitions that `downstream_key` of the child reads from
    pub fn upstream_partitions(
        &self,
        downstream_def: Option<&PartitionsDefinition>,
        downstream_key: Option<&str>,
        upstream_def: Option<&PartitionsDefinition>,
    ) -> Result<MappedPartitions, PartitionMappingError> {
        self.map_key(downstream_def, downstream_key, upstream_def)
    }

    fn map_key(
        &self,
        from_def: Option<&PartitionsDefinition>,
        key: Option<&str>,
        to_def: Option<&PartitionsDefinition>,
    ) -> Result<MappedPartitions, PartitionMappingError> {
        match self {
            PartitionMapping::Identity => Ok(MappedPartitions::Keys(vec![key.map(str::to_string)])),
            PartitionMapping::AllPartitions => match to_def {
                None => Ok(MappedPartitions::Keys(vec![None])),
                Some(_) => Ok(MappedPartitions::All),
            },
            PartitionMapping::TimeWindow => {
                let incompatible = || PartitionMappingError::IncompatibleTypes {
                    upstream: describe(from_def),
                    downstream: describe(to_def),
                };
                let from = from_def
                    .and_then(PartitionsDefinition::as_time_window)
                    .ok_or_else(incompatible)?;
                let to = to_def
                    .and_then(PartitionsDefinition::as_time_window)
                    .ok_or_else(incompatible)?;
                let key = key.ok_or(PartitionMappingError::MissingPartitionKey)?;

                let (start, end) = from.window(key)?;
                Ok(MappedPartitions::Keys(
                    to.keys_overlapping(start, end).into_iter().map(Some).collect(),
                ))
            }
        }
    }
}

fn describe(def: Option<&PartitionsDefinition>) -> String {
    match def {
        None => "unpartitioned".to_string(),
        Some(PartitionsDefinition::Static { .. }) => "static partitions".to_string(),
        Some(PartitionsDefinition::TimeWindow(windows)) => {
            let granularity = match windows.granularity {
                TimeGranularity::Hourly => "hourly",
                TimeGranularity::Daily => "daily",
                TimeGranularity::Weekly => "weekly",
                TimeGranularity::Monthly => "monthly",
                TimeGranularity::Yearly => "yearly",
            };
            format!("{granularity} partitions")
        }
    }
}
