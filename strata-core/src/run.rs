//! Run records
//!
//! Runs are launched by the execution engine, not by this crate. They are
//! stored so backfill status queries can report, per partition, the run that
//! is materializing it.

use crate::backfill::BackfillId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix reserved for system tags
pub const SYSTEM_TAG_PREFIX: &str = "strata/";

/// Tag linking a run to the backfill that requested it
pub const BACKFILL_ID_TAG: &str = "strata/backfill";

/// Tag recording which partition a run materializes
pub const PARTITION_NAME_TAG: &str = "strata/partition";

/// Status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Queued,
    NotStarted,
    Starting,
    Started,
    Success,
    Failure,
    Canceling,
    Canceled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::NotStarted => "not_started",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Canceling => "canceling",
            Self::Canceled => "canceled",
        }
    }

    /// Whether the run has reached a terminal state
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Canceled)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "queued" => Ok(Self::Queued),
            "not_started" => Ok(Self::NotStarted),
            "starting" => Ok(Self::Starting),
            "started" => Ok(Self::Started),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "canceling" => Ok(Self::Canceling),
            "canceled" => Ok(Self::Canceled),
            other => Err(crate::Error::UnknownStatus(other.to_string())),
        }
    }
}

/// A run as recorded in storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub tags: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RunRecord {
    /// Create a new run in the given status
    pub fn new(status: RunStatus) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            status,
            tags: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Create a queued run tagged for a backfill partition
    pub fn for_backfill_partition(backfill_id: BackfillId, partition: impl Into<String>) -> Self {
        Self::new(RunStatus::Queued)
            .with_tag(BACKFILL_ID_TAG, backfill_id.to_string())
            .with_tag(PARTITION_NAME_TAG, partition)
    }

    /// Add a tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Return a copy with a new status and updated timestamp
    pub fn with_status(mut self, status: RunStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    /// Backfill this run belongs to, if tagged
    pub fn backfill_id(&self) -> Option<&str> {
        self.tags.get(BACKFILL_ID_TAG).map(String::as_str)
    }

    /// Partition this run materializes, if tagged
    pub fn partition_key(&self) -> Option<&str> {
        self.tags.get(PARTITION_NAME_TAG).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backfill_partition_tags() {
        let backfill_id = BackfillId::new();
        let run = RunRecord::for_backfill_partition(backfill_id, "a");

        assert_eq!(run.status, RunStatus::Queued);
        assert_eq!(run.backfill_id(), Some(backfill_id.to_string().as_str()));
        assert_eq!(run.partition_key(), Some("a"));
    }

    #[test]
    fn test_untagged_run() {
        let run = RunRecord::new(RunStatus::Started);
        assert!(run.backfill_id().is_none());
        assert!(run.partition_key().is_none());
    }

    #[test]
    fn test_status_transitions_touch_timestamp() {
        let run = RunRecord::new(RunStatus::Queued);
        let created = run.updated_at;
        let run = run.with_status(RunStatus::Success);
        assert!(run.status.is_finished());
        assert!(run.updated_at >= created);
    }

    #[test]
    fn test_status_strings() {
        for status in [
            RunStatus::Queued,
            RunStatus::NotStarted,
            RunStatus::Starting,
            RunStatus::Started,
            RunStatus::Success,
            RunStatus::Failure,
            RunStatus::Canceling,
            RunStatus::Canceled,
        ] {
            assert_eq!(status.as_str().parse::<RunStatus>().unwrap(), status);
        }
        assert!(!RunStatus::Started.is_finished());
    }
}
