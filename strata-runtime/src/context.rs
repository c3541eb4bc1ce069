//! Per-request workspace context

use crate::Result;
use std::fmt;
use std::sync::Arc;
use strata_core::Repository;
use strata_storage::Storage;

/// Operations gated on write access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    LaunchPartitionBackfill,
    CancelPartitionBackfill,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LaunchPartitionBackfill => f.write_str("launch_partition_backfill"),
            Self::CancelPartitionBackfill => f.write_str("cancel_partition_backfill"),
        }
    }
}

/// Everything a request needs: where backfills live, the definitions they
/// are resolved against, and whether the caller may write.
///
/// Cloning is cheap; storage and repository are shared.
#[derive(Clone)]
pub struct WorkspaceContext {
    storage: Arc<dyn Storage>,
    repository: Arc<Repository>,
    read_only: bool,
}

impl WorkspaceContext {
    /// Create a writable context
    pub fn new(storage: Arc<dyn Storage>, repository: Arc<Repository>) -> Self {
        Self {
            storage,
            repository,
            read_only: false,
        }
    }

    /// Set read-only mode
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    /// Whether the context grants `permission`
    pub fn has_permission(&self, _permission: Permission) -> bool {
        !self.read_only
    }

    /// Fail with [`crate::Error::Unauthorized`] unless `permission` is granted
    pub fn assert_permission(&self, permission: Permission) -> Result<()> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(crate::Error::Unauthorized(format!(
                "Workspace is read-only; {} is not permitted",
                permission
            )))
        }
    }
}

impl fmt::Debug for WorkspaceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkspaceContext")
            .field("repository", self.repository.origin())
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
