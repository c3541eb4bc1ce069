//! Storage trait shared by all backends

use crate::Result;
use async_trait::async_trait;
use strata_core::{BackfillId, BulkActionStatus, PartitionBackfill, RunRecord, RunStatus};
use uuid::Uuid;

/// Largest page a backfill listing may request
pub const MAX_PAGE_SIZE: usize = 1000;

/// Filters and paging for backfill listings
///
/// Results are ordered newest first. `cursor` is the id of the last backfill
/// of the previous page; listing resumes strictly after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackfillFilters {
    pub status: Option<BulkActionStatus>,
    pub cursor: Option<BackfillId>,
    pub limit: Option<usize>,
}

impl BackfillFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: BulkActionStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn cursor(mut self, cursor: BackfillId) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate pagination parameters
    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.limit {
            if limit == 0 {
                return Err(crate::Error::ValidationError(
                    "Limit must be greater than 0".to_string(),
                ));
            }
            if limit > MAX_PAGE_SIZE {
                return Err(crate::Error::ValidationError(format!(
                    "Limit cannot exceed {}",
                    MAX_PAGE_SIZE
                )));
            }
        }
        Ok(())
    }
}

/// Durable store for backfills and runs
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new backfill
    async fn add_backfill(&self, backfill: &PartitionBackfill) -> Result<()>;

    /// Fetch a backfill by id
    async fn get_backfill(&self, backfill_id: BackfillId) -> Result<Option<PartitionBackfill>>;

    /// List backfills, newest first
    async fn get_backfills(&self, filters: &BackfillFilters) -> Result<Vec<PartitionBackfill>>;

    /// Replace the mutable fields (status, error) of an existing backfill
    async fn update_backfill(&self, backfill: &PartitionBackfill) -> Result<()>;

    /// Like [`Storage::update_backfill`], but only while the stored status is
    /// still `expected`; otherwise fails with [`crate::Error::Conflict`]
    async fn update_backfill_if_status(
        &self,
        backfill: &PartitionBackfill,
        expected: BulkActionStatus,
    ) -> Result<()>;

    /// Record a run
    async fn add_run(&self, run: &RunRecord) -> Result<()>;

    /// Change the status of a recorded run
    async fn update_run_status(&self, run_id: Uuid, status: RunStatus) -> Result<()>;

    /// Runs tagged with the given backfill, oldest first
    async fn get_runs_for_backfill(&self, backfill_id: BackfillId) -> Result<Vec<RunRecord>>;
}
