//! GraphQL output objects and enums

use async_graphql::{Context, Enum, Object, Result, SimpleObject};
use strata_core::{BulkActionStatus, RunStatus};
use strata_runtime::{BackfillSummary, WorkspaceContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(name = "BulkActionStatus")]
pub enum GqlBulkActionStatus {
    Requested,
    Canceling,
    Canceled,
    Completed,
    Failed,
}

impl From<BulkActionStatus> for GqlBulkActionStatus {
    fn from(status: BulkActionStatus) -> Self {
        match status {
            BulkActionStatus::Requested => Self::Requested,
            BulkActionStatus::Canceling => Self::Canceling,
            BulkActionStatus::Canceled => Self::Canceled,
            BulkActionStatus::Completed => Self::Completed,
            BulkActionStatus::Failed => Self::Failed,
        }
    }
}

impl From<GqlBulkActionStatus> for BulkActionStatus {
    fn from(status: GqlBulkActionStatus) -> Self {
        match status {
            GqlBulkActionStatus::Requested => Self::Requested,
            GqlBulkActionStatus::Canceling => Self::Canceling,
            GqlBulkActionStatus::Canceled => Self::Canceled,
            GqlBulkActionStatus::Completed => Self::Completed,
            GqlBulkActionStatus::Failed => Self::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Enum)]
#[graphql(name = "RunStatus")]
pub enum GqlRunStatus {
    Queued,
    NotStarted,
    Starting,
    Started,
    Success,
    Failure,
    Canceling,
    Canceled,
}

impl From<RunStatus> for GqlRunStatus {
    fn from(status: RunStatus) -> Self {
        match status {
            RunStatus::Queued => Self::Queued,
            RunStatus::NotStarted => Self::NotStarted,
            RunStatus::Starting => Self::Starting,
            RunStatus::Started => Self::Started,
            RunStatus::Success => Self::Success,
            RunStatus::Failure => Self::Failure,
            RunStatus::Canceling => Self::Canceling,
            RunStatus::Canceled => Self::Canceled,
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "AssetKey")]
pub struct GqlAssetKey {
    pub path: Vec<String>,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct BackfillTag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "RepositoryOrigin")]
pub struct GqlRepositoryOrigin {
    pub id: String,
    pub repository_name: String,
    pub repository_location_name: String,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "PartitionSet")]
pub struct GqlPartitionSet {
    pub id: String,
    pub name: String,
    pub mode: String,
    pub pipeline_name: String,
    pub repository_origin: GqlRepositoryOrigin,
}

#[derive(Debug, Clone, SimpleObject)]
#[graphql(name = "PartitionStatus")]
pub struct GqlPartitionStatus {
    pub id: String,
    pub partition_name: String,
    pub run_id: Option<String>,
    pub run_status: Option<GqlRunStatus>,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PartitionStatuses {
    pub results: Vec<GqlPartitionStatus>,
}

/// A backfill resolved against the request's repository
#[derive(Debug, Clone)]
pub struct GqlPartitionBackfill(pub BackfillSummary);

#[Object(name = "PartitionBackfill")]
impl GqlPartitionBackfill {
    async fn backfill_id(&self) -> String {
        self.0.backfill_id().to_string()
    }

    async fn status(&self) -> GqlBulkActionStatus {
        self.0.backfill.status.into()
    }

    async fn num_partitions(&self) -> usize {
        self.0.num_partitions()
    }

    /// Launch time in seconds since the epoch
    async fn timestamp(&self) -> f64 {
        self.0.backfill.timestamp.timestamp_millis() as f64 / 1000.0
    }

    async fn partition_names(&self) -> &[String] {
        self.0.partition_names()
    }

    async fn partition_set_name(&self) -> Option<&str> {
        self.0.partition_set_name()
    }

    async fn partition_set(&self) -> Option<GqlPartitionSet> {
        self.0
            .partition_set()
            .map(|(origin, definition)| GqlPartitionSet {
                id: origin.id(),
                name: definition.name.clone(),
                mode: definition.mode.clone(),
                pipeline_name: definition.job_name.clone(),
                repository_origin: GqlRepositoryOrigin {
                    id: origin.repository_origin.id(),
                    repository_name: origin.repository_origin.repository_name.clone(),
                    repository_location_name: origin
                        .repository_origin
                        .repository_location_name
                        .clone(),
                },
            })
    }

    async fn asset_selection(&self) -> Option<Vec<GqlAssetKey>> {
        self.0.backfill.asset_selection().map(|keys| {
            keys.iter()
                .map(|k| GqlAssetKey {
                    path: k.path().to_vec(),
                })
                .collect()
        })
    }

    async fn is_asset_backfill(&self) -> bool {
        self.0.backfill.is_asset_backfill()
    }

    async fn from_failure(&self) -> bool {
        self.0.backfill.from_failure
    }

    async fn tags(&self) -> Vec<BackfillTag> {
        self.0
            .backfill
            .tags
            .iter()
            .map(|(key, value)| BackfillTag {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    async fn error(&self) -> Option<&str> {
        self.0.backfill.error.as_deref()
    }

    async fn partition_statuses(&self, ctx: &Context<'_>) -> Result<PartitionStatuses> {
        let workspace = ctx.data::<WorkspaceContext>()?;
        let statuses = strata_runtime::partition_statuses(workspace, &self.0).await?;
        Ok(PartitionStatuses {
            results: statuses
                .into_iter()
                .map(|s| GqlPartitionStatus {
                    id: s.id,
                    partition_name: s.partition_name,
                    run_id: s.run_id.map(|id| id.to_string()),
                    run_status: s.run_status.map(Into::into),
                })
                .collect(),
        })
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PartitionBackfills {
    pub results: Vec<GqlPartitionBackfill>,
}
