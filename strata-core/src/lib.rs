//! # Strata Core
//!
//! Domain model for asset-partition backfills: asset keys, partitions
//! definitions, the asset graph, target subsets, and the persisted
//! backfill record.

pub mod asset;
pub mod asset_graph;
pub mod backfill;
pub mod partitions;
pub mod repository;
pub mod run;
pub mod subset;

// Re-export commonly used types
pub use asset::{AssetKey, AssetNode, AssetNodeBuilder};
pub use asset_graph::AssetGraph;
pub use backfill::{
    AssetBackfillData, BackfillId, BackfillTarget, BulkActionStatus, PartitionBackfill,
};
pub use partitions::{PartitionsDefinition, TimeGranularity};
pub use repository::{
    PartitionSetDefinition, PartitionSetOrigin, Repository, RepositoryBuilder,
    RepositoryDefinition, RepositoryOrigin,
};
pub use run::{RunRecord, RunStatus, BACKFILL_ID_TAG, PARTITION_NAME_TAG, SYSTEM_TAG_PREFIX};
pub use subset::{AssetGraphSubset, PartitionsSubset};

/// Result type for Strata core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Strata core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid asset key: {0}")]
    InvalidAssetKey(String),

    #[error("Invalid partitions definition: {0}")]
    InvalidPartitionsDefinition(String),

    #[error("Duplicate asset: {0}")]
    DuplicateAsset(AssetKey),

    #[error("Asset {asset} depends on unknown asset {upstream}")]
    UnknownDependency { asset: AssetKey, upstream: AssetKey },

    #[error("Circular dependency detected in asset graph")]
    CircularDependency,

    #[error("Unknown asset keys: {}", format_keys(.0))]
    UnknownAssets(Vec<AssetKey>),

    #[error("Duplicate partition set: {0}")]
    DuplicatePartitionSet(String),

    #[error("Invalid backfill id: {0}")]
    InvalidBackfillId(String),

    #[error("Invalid target subset: {0}")]
    InvalidSubset(String),

    #[error("Serialized backfill data is not compatible with the current asset graph: {0}")]
    IncompatibleSerialization(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn format_keys(keys: &[AssetKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
