//! Database row types and their conversions to domain records

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use std::collections::BTreeMap;
use strata_core::{BackfillId, BackfillTarget, PartitionBackfill, RunRecord};
use uuid::Uuid;

/// Row of the `backfills` table
#[derive(Debug, Clone, FromRow)]
pub struct BackfillModel {
    pub id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub target: Json<BackfillTarget>,
    pub from_failure: bool,
    pub tags: Json<BTreeMap<String, String>>,
    pub error_message: Option<String>,
}

impl From<&PartitionBackfill> for BackfillModel {
    fn from(backfill: &PartitionBackfill) -> Self {
        Self {
            id: backfill.backfill_id.0,
            status: backfill.status.as_str().to_string(),
            created_at: backfill.timestamp,
            target: Json(backfill.target.clone()),
            from_failure: backfill.from_failure,
            tags: Json(backfill.tags.clone()),
            error_message: backfill.error.clone(),
        }
    }
}

impl TryFrom<BackfillModel> for PartitionBackfill {
    type Error = crate::Error;

    fn try_from(row: BackfillModel) -> crate::Result<Self> {
        Ok(Self {
            backfill_id: BackfillId(row.id),
            status: row.status.parse()?,
            timestamp: row.created_at,
            target: row.target.0,
            from_failure: row.from_failure,
            tags: row.tags.0,
            error: row.error_message,
        })
    }
}

/// Row of the `runs` table
///
/// `backfill_id` and `partition_key` are copies of the run's system tags,
/// kept in columns so they can be indexed.
#[derive(Debug, Clone, FromRow)]
pub struct RunModel {
    pub id: Uuid,
    pub backfill_id: Option<String>,
    pub partition_key: Option<String>,
    pub status: String,
    pub tags: Json<BTreeMap<String, String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&RunRecord> for RunModel {
    fn from(run: &RunRecord) -> Self {
        Self {
            id: run.run_id,
            backfill_id: run.backfill_id().map(str::to_string),
            partition_key: run.partition_key().map(str::to_string),
            status: run.status.as_str().to_string(),
            tags: Json(run.tags.clone()),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}

impl TryFrom<RunModel> for RunRecord {
    type Error = crate::Error;

    fn try_from(row: RunModel) -> crate::Result<Self> {
        Ok(Self {
            run_id: row.id,
            status: row.status.parse()?,
            tags: row.tags.0,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}
