//! # Backfill Graph
//!
//! Asset dependency graph: which assets exist, how they are partitioned, which
//! backfill policy each declares, and how partitions map across every
//! dependency edge.

pub mod graph;
pub mod queries;

// Re-export commonly used types
pub use graph::{AssetGraph, AssetNode, DependencyEdge, GraphDefinition};
pub use queries::GraphQuery;

use backfill_core::PartitionMappingError;

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for graph operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Asset not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate asset definition: {0}")]
    DuplicateAsset(String),

    #[error("Asset {asset} depends on unknown asset {missing}")]
    MissingDependency { asset: String, missing: String },

    #[error("Circular dependency detected")]
    CircularDependency,

    #[error("Incompatible partitions between {upstream} and {downstream}: {source}")]
    IncompatiblePartitions {
        upstream: String,
        downstream: String,
        #[source]
        source: PartitionMappingError,
    },
}
