//! # Backfill Core
//!
//! Core data model for asset backfills: asset identities, asset-partitions,
//! partitions definitions (the partition key space), partition mappings between
//! dependent assets, and per-asset backfill policies.

pub mod asset;
pub mod partition_mapping;
pub mod partitions;
pub mod policy;
pub mod subset;

// Re-export commonly used types
pub use asset::{AssetDefinition, AssetDefinitionBuilder, AssetKey, AssetPartition};
pub use partition_mapping::{infer_mapping, MappedPartitions, PartitionMapping, PartitionMappingError};
pub use partitions::{
    PartitionError, PartitionsDefinition, StaticPartitions, TimeGranularity, TimeWindowPartitions,
};
pub use policy::{BackfillPolicy, PolicyError};
pub use subset::AssetPartitionSubset;

/// Result type for core model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for core model operations
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    #[error("Partition error: {0}")]
    Partition(#[from] PartitionError),

    #[error("Partition mapping error: {0}")]
    Mapping(#[from] PartitionMappingError),

    #[error("Backfill policy error: {0}")]
    Policy(#[from] PolicyError),
}
