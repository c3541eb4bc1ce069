//! Reading backfills back against the current repository
//!
//! Stored asset backfill data is resolved against the repository carried by
//! the request, which may differ from the one the backfill was launched
//! with. Data that no longer fits the asset graph reports no partitions.

use crate::context::WorkspaceContext;
use crate::Result;
use std::collections::{BTreeSet, HashMap};
use strata_core::{
    BackfillId, BackfillTarget, PartitionBackfill, PartitionSetDefinition, PartitionSetOrigin,
    Repository, RunStatus,
};
use strata_storage::BackfillFilters;
use tracing::{instrument, warn};
use uuid::Uuid;

/// A backfill with its partitions resolved
#[derive(Debug, Clone, PartialEq)]
pub struct BackfillSummary {
    pub backfill: PartitionBackfill,
    partition_names: Vec<String>,
    partition_set: Option<PartitionSetDefinition>,
}

impl BackfillSummary {
    /// Resolve `backfill` against `repository`
    pub fn resolve(backfill: PartitionBackfill, repository: &Repository) -> Self {
        let (partition_names, partition_set) = match &backfill.target {
            BackfillTarget::Assets {
                serialized_asset_backfill_data,
                ..
            } => {
                let names = match strata_core::AssetBackfillData::from_serialized(
                    serialized_asset_backfill_data,
                    repository.asset_graph(),
                ) {
                    Ok(data) => data.partition_names().into_iter().collect(),
                    Err(e) => {
                        warn!(
                            backfill_id = %backfill.backfill_id,
                            error = %e,
                            "Asset backfill data does not match current definitions"
                        );
                        Vec::new()
                    }
                };
                (names, None)
            }
            BackfillTarget::PartitionSet {
                partition_set_origin,
                partition_names,
            } => {
                let names: BTreeSet<String> = partition_names.iter().cloned().collect();
                (
                    names.into_iter().collect(),
                    resolve_partition_set(partition_set_origin, repository),
                )
            }
        };

        Self {
            backfill,
            partition_names,
            partition_set,
        }
    }

    pub fn backfill_id(&self) -> BackfillId {
        self.backfill.backfill_id
    }

    /// Sorted partition names resolvable against the current repository
    pub fn partition_names(&self) -> &[String] {
        &self.partition_names
    }

    pub fn num_partitions(&self) -> usize {
        self.partition_names.len()
    }

    /// Name of the targeted partition set; `None` for asset backfills
    pub fn partition_set_name(&self) -> Option<&str> {
        self.backfill
            .partition_set_origin()
            .map(|o| o.partition_set_name.as_str())
    }

    /// Targeted partition set, if it still exists in the current repository
    pub fn partition_set(&self) -> Option<(&PartitionSetOrigin, &PartitionSetDefinition)> {
        self.backfill
            .partition_set_origin()
            .zip(self.partition_set.as_ref())
    }
}

fn resolve_partition_set(
    origin: &PartitionSetOrigin,
    repository: &Repository,
) -> Option<PartitionSetDefinition> {
    if origin.repository_origin != *repository.origin() {
        return None;
    }
    repository.partition_set(&origin.partition_set_name).cloned()
}

/// Status of one partition of a backfill
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStatus {
    /// `<backfill id>:<partition name>`
    pub id: String,
    pub partition_name: String,
    pub run_id: Option<Uuid>,
    pub run_status: Option<RunStatus>,
}

/// List backfills, newest first
#[instrument(skip(ctx))]
pub async fn get_backfills(
    ctx: &WorkspaceContext,
    filters: &BackfillFilters,
) -> Result<Vec<BackfillSummary>> {
    let backfills = ctx.storage().get_backfills(filters).await?;
    Ok(backfills
        .into_iter()
        .map(|b| BackfillSummary::resolve(b, ctx.repository()))
        .collect())
}

/// Fetch a single backfill
#[instrument(skip(ctx), fields(backfill_id = %backfill_id))]
pub async fn get_backfill(ctx: &WorkspaceContext, backfill_id: BackfillId) -> Result<BackfillSummary> {
    let backfill = ctx
        .storage()
        .get_backfill(backfill_id)
        .await?
        .ok_or_else(|| crate::Error::BackfillNotFound(backfill_id.to_string()))?;
    Ok(BackfillSummary::resolve(backfill, ctx.repository()))
}

/// One status per resolvable partition, carrying the latest run tagged for it
#[instrument(skip(ctx, summary), fields(backfill_id = %summary.backfill_id()))]
pub async fn partition_statuses(
    ctx: &WorkspaceContext,
    summary: &BackfillSummary,
) -> Result<Vec<PartitionStatus>> {
    let backfill_id = summary.backfill_id();
    let runs = ctx.storage().get_runs_for_backfill(backfill_id).await?;

    // Runs come back oldest first, so later entries win
    let mut latest = HashMap::new();
    for run in &runs {
        if let Some(partition) = run.partition_key() {
            latest.insert(partition, run);
        }
    }

    Ok(summary
        .partition_names()
        .iter()
        .map(|name| {
            let run = latest.get(name.as_str());
            PartitionStatus {
                id: format!("{}:{}", backfill_id, name),
                partition_name: name.clone(),
                run_id: run.map(|r| r.run_id),
                run_status: run.map(|r| r.status),
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{launch_backfill, LaunchBackfillParams, PartitionSetSelector};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use strata_core::{AssetKey, AssetNode, PartitionsDefinition, RunRecord};
    use strata_storage::{InMemoryStorage, Storage};

    fn letters() -> PartitionsDefinition {
        PartitionsDefinition::static_keys(["a", "b", "c"]).unwrap()
    }

    fn partitioned_repo() -> Repository {
        Repository::builder("repo")
            .asset(AssetNode::builder("asset1").partitions_def(letters()).build())
            .asset(AssetNode::builder("asset2").partitions_def(letters()).build())
            .partition_set(PartitionSetDefinition::new("letters_set", "letters_job", letters()))
            .build()
            .unwrap()
    }

    fn repo_with_non_partitioned_asset() -> Repository {
        Repository::builder("repo")
            .asset(AssetNode::builder("asset1").partitions_def(letters()).build())
            .asset(
                AssetNode::builder("asset2")
                    .depends_on(AssetKey::new("asset1"))
                    .build(),
            )
            .build()
            .unwrap()
    }

    fn all_keys() -> Vec<AssetKey> {
        vec![AssetKey::new("asset1"), AssetKey::new("asset2")]
    }

    #[tokio::test]
    async fn test_summary_counts_distinct_partitions() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let ctx = WorkspaceContext::new(storage, Arc::new(partitioned_repo()));
        let launched = launch_backfill(&ctx, LaunchBackfillParams::for_assets(all_keys(), ["b", "a"]))
            .await
            .unwrap();

        let summary = get_backfill(&ctx, launched.backfill_id).await.unwrap();
        assert_eq!(summary.num_partitions(), 2);
        assert_eq!(summary.partition_names(), ["a".to_string(), "b".to_string()]);
        assert!(summary.partition_set().is_none());
        assert!(summary.partition_set_name().is_none());
    }

    #[tokio::test]
    async fn test_summary_against_changed_definitions() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let ctx = WorkspaceContext::new(storage.clone(), Arc::new(partitioned_repo()));
        let launched = launch_backfill(&ctx, LaunchBackfillParams::for_assets(all_keys(), ["a", "b"]))
            .await
            .unwrap();

        let changed = WorkspaceContext::new(storage, Arc::new(repo_with_non_partitioned_asset()));
        let summary = get_backfill(&changed, launched.backfill_id).await.unwrap();
        assert_eq!(summary.num_partitions(), 0);
        assert!(summary.partition_names().is_empty());
        assert!(partition_statuses(&changed, &summary).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_partition_statuses_use_latest_run() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let ctx = WorkspaceContext::new(storage.clone(), Arc::new(partitioned_repo()));
        let launched = launch_backfill(&ctx, LaunchBackfillParams::for_assets(all_keys(), ["a", "b"]))
            .await
            .unwrap();
        let id = launched.backfill_id;

        let failed = RunRecord::for_backfill_partition(id, "a").with_status(RunStatus::Failure);
        let retried = RunRecord::for_backfill_partition(id, "a").with_status(RunStatus::Success);
        storage.add_run(&failed).await.unwrap();
        storage.add_run(&retried).await.unwrap();

        let summary = get_backfill(&ctx, id).await.unwrap();
        let statuses = partition_statuses(&ctx, &summary).await.unwrap();

        assert_eq!(
            statuses,
            vec![
                PartitionStatus {
                    id: format!("{}:a", id),
                    partition_name: "a".to_string(),
                    run_id: Some(retried.run_id),
                    run_status: Some(RunStatus::Success),
                },
                PartitionStatus {
                    id: format!("{}:b", id),
                    partition_name: "b".to_string(),
                    run_id: None,
                    run_status: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_partition_set_summary() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let repo = partitioned_repo();
        let selector = PartitionSetSelector {
            partition_set_name: "letters_set".to_string(),
            repository_name: repo.origin().repository_name.clone(),
            repository_location_name: repo.origin().repository_location_name.clone(),
        };
        let ctx = WorkspaceContext::new(storage.clone(), Arc::new(repo));
        let launched = launch_backfill(
            &ctx,
            LaunchBackfillParams::for_partition_set(selector, ["c", "a"]),
        )
        .await
        .unwrap();

        let summary = get_backfill(&ctx, launched.backfill_id).await.unwrap();
        assert_eq!(summary.partition_names(), ["a".to_string(), "c".to_string()]);
        assert_eq!(summary.partition_set_name(), Some("letters_set"));
        let (origin, definition) = summary.partition_set().unwrap();
        assert_eq!(origin.partition_set_name, "letters_set");
        assert_eq!(definition.job_name, "letters_job");

        // The name survives even when the set is gone from the repository
        let gone = WorkspaceContext::new(storage, Arc::new(Repository::empty()));
        let summary = get_backfill(&gone, launched.backfill_id).await.unwrap();
        assert_eq!(summary.partition_set_name(), Some("letters_set"));
        assert!(summary.partition_set().is_none());
    }

    #[tokio::test]
    async fn test_get_backfills_and_missing_backfill() {
        let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());
        let ctx = WorkspaceContext::new(storage, Arc::new(partitioned_repo()));
        let first = launch_backfill(&ctx, LaunchBackfillParams::for_assets(all_keys(), ["a"]))
            .await
            .unwrap();
        let second = launch_backfill(&ctx, LaunchBackfillParams::for_assets(all_keys(), ["b"]))
            .await
            .unwrap();

        let all = get_backfills(&ctx, &BackfillFilters::new()).await.unwrap();
        let ids: Vec<_> = all.iter().map(BackfillSummary::backfill_id).collect();
        assert_eq!(ids, vec![second.backfill_id, first.backfill_id]);

        assert!(matches!(
            get_backfill(&ctx, BackfillId::new()).await,
            Err(crate::Error::BackfillNotFound(_))
        ));
    }
}
