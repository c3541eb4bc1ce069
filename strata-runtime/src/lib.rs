//! # Strata Runtime
//!
//! Backfill operations on top of a repository of definitions and a
//! [`strata_storage::Storage`] backend: launching asset and partition-set
//! backfills, cancelling them, and reading them back with their partition
//! statuses.

pub mod context;
pub mod launcher;
pub mod metrics;
pub mod query;

// Re-export commonly used types
pub use context::{Permission, WorkspaceContext};
pub use launcher::{
    cancel_backfill, launch_backfill, LaunchBackfillParams, LaunchedBackfill,
    PartitionSetSelector,
};
pub use query::{get_backfill, get_backfills, partition_statuses, BackfillSummary, PartitionStatus};

/// Result type for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for runtime operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Partition set not found: {0}")]
    PartitionSetNotFound(String),

    #[error("Invalid backfill parameters: {0}")]
    InvalidParams(String),

    #[error("Backfill not found: {0}")]
    BackfillNotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Storage error: {0}")]
    Storage(#[from] strata_storage::Error),

    #[error("Definition error: {0}")]
    Core(#[from] strata_core::Error),
}

impl Error {
    /// Label used when counting rejected launches
    pub fn rejection_reason(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::PartitionSetNotFound(_) => "partition_set_not_found",
            Self::InvalidParams(_) => "invalid_params",
            Self::BackfillNotFound(_) => "backfill_not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::Storage(_) => "storage",
            Self::Core(_) => "definition",
        }
    }
}
