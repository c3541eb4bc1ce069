//! In-memory storage implementation
//!
//! Keeps backfills in insertion order so listings and cursors behave the
//! same way as the PostgreSQL backend's sequence column.

use crate::store::{BackfillFilters, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use strata_core::{BackfillId, BulkActionStatus, PartitionBackfill, RunRecord, RunStatus};
use tracing::instrument;
use uuid::Uuid;

/// Storage backed by process memory
///
/// Guards are never held across await points.
#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    backfills: Vec<PartitionBackfill>,
    backfill_positions: HashMap<BackfillId, usize>,
    runs: Vec<RunRecord>,
    run_positions: HashMap<Uuid, usize>,
}

impl InMemoryStorage {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored backfills
    pub fn backfill_count(&self) -> usize {
        self.inner.read().backfills.len()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    #[instrument(skip(self, backfill), fields(backfill_id = %backfill.backfill_id))]
    async fn add_backfill(&self, backfill: &PartitionBackfill) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.backfill_positions.contains_key(&backfill.backfill_id) {
            return Err(crate::Error::AlreadyExists(format!(
                "Backfill {}",
                backfill.backfill_id
            )));
        }
        let position = inner.backfills.len();
        inner.backfills.push(backfill.clone());
        inner
            .backfill_positions
            .insert(backfill.backfill_id, position);
        Ok(())
    }

    async fn get_backfill(&self, backfill_id: BackfillId) -> Result<Option<PartitionBackfill>> {
        let inner = self.inner.read();
        Ok(inner
            .backfill_positions
            .get(&backfill_id)
            .map(|&pos| inner.backfills[pos].clone()))
    }

    #[instrument(skip(self))]
    async fn get_backfills(&self, filters: &BackfillFilters) -> Result<Vec<PartitionBackfill>> {
        filters.validate()?;
        let inner = self.inner.read();

        let end = match filters.cursor {
            Some(cursor) => *inner.backfill_positions.get(&cursor).ok_or_else(|| {
                crate::Error::NotFound(format!("Backfill cursor {}", cursor))
            })?,
            None => inner.backfills.len(),
        };

        let matching = inner.backfills[..end]
            .iter()
            .rev()
            .filter(|b| filters.status.map_or(true, |s| b.status == s))
            .cloned();

        Ok(match filters.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    #[instrument(skip(self, backfill), fields(backfill_id = %backfill.backfill_id))]
    async fn update_backfill(&self, backfill: &PartitionBackfill) -> Result<()> {
        let mut inner = self.inner.write();
        let position = *inner
            .backfill_positions
            .get(&backfill.backfill_id)
            .ok_or_else(|| crate::Error::NotFound(format!("Backfill {}", backfill.backfill_id)))?;

        let stored = &mut inner.backfills[position];
        stored.status = backfill.status;
        stored.error = backfill.error.clone();
        Ok(())
    }

    #[instrument(skip(self, backfill), fields(backfill_id = %backfill.backfill_id))]
    async fn update_backfill_if_status(
        &self,
        backfill: &PartitionBackfill,
        expected: BulkActionStatus,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let position = *inner
            .backfill_positions
            .get(&backfill.backfill_id)
            .ok_or_else(|| crate::Error::NotFound(format!("Backfill {}", backfill.backfill_id)))?;

        let stored = &mut inner.backfills[position];
        if stored.status != expected {
            return Err(crate::Error::Conflict(format!(
                "Backfill {} is {}, expected {}",
                backfill.backfill_id, stored.status, expected
            )));
        }
        stored.status = backfill.status;
        stored.error = backfill.error.clone();
        Ok(())
    }

    #[instrument(skip(self, run), fields(run_id = %run.run_id))]
    async fn add_run(&self, run: &RunRecord) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.run_positions.contains_key(&run.run_id) {
            return Err(crate::Error::AlreadyExists(format!("Run {}", run.run_id)));
        }
        let position = inner.runs.len();
        inner.runs.push(run.clone());
        inner.run_positions.insert(run.run_id, position);
        Ok(())
    }

    async fn update_run_status(&self, run_id: Uuid, status: RunStatus) -> Result<()> {
        let mut inner = self.inner.write();
        let position = *inner
            .run_positions
            .get(&run_id)
            .ok_or_else(|| crate::Error::NotFound(format!("Run {}", run_id)))?;

        let run = &mut inner.runs[position];
        run.status = status;
        run.updated_at = Utc::now();
        Ok(())
    }

    async fn get_runs_for_backfill(&self, backfill_id: BackfillId) -> Result<Vec<RunRecord>> {
        let backfill_id = backfill_id.to_string();
        let inner = self.inner.read();
        Ok(inner
            .runs
            .iter()
            .filter(|r| r.backfill_id() == Some(backfill_id.as_str()))
            .cloned()
            .collect())
    }
}
