//! Launching and cancelling backfills
//!
//! Launching validates the request against the context's repository,
//! resolves the target and persists a `REQUESTED` backfill record. Runs are
//! not launched here; the execution engine picks requested backfills up from
//! storage, so `launched_run_ids` is always empty.

use crate::context::{Permission, WorkspaceContext};
use crate::metrics::{
    BACKFILLS_LAUNCHED_TOTAL, BACKFILL_CANCELLATIONS_TOTAL, BACKFILL_LAUNCH_REJECTIONS_TOTAL,
};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use strata_core::{
    AssetBackfillData, AssetKey, BackfillId, BulkActionStatus, PartitionBackfill, RunStatus,
    SYSTEM_TAG_PREFIX,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Identifies a partition set inside a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionSetSelector {
    pub partition_set_name: String,
    pub repository_name: String,
    pub repository_location_name: String,
}

/// Parameters of a backfill launch
///
/// Exactly one of `asset_selection` and `selector` must be set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchBackfillParams {
    pub partition_names: Vec<String>,
    pub asset_selection: Option<Vec<AssetKey>>,
    pub selector: Option<PartitionSetSelector>,
    pub all_partitions: bool,
    pub from_failure: bool,
    pub tags: Vec<(String, String)>,
}

impl LaunchBackfillParams {
    /// Asset backfill over `asset_selection` for the given partitions
    pub fn for_assets<I, S>(asset_selection: Vec<AssetKey>, partition_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            asset_selection: Some(asset_selection),
            partition_names: partition_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Partition-set backfill for the given partitions
    pub fn for_partition_set<I, S>(selector: PartitionSetSelector, partition_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selector: Some(selector),
            partition_names: partition_names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_all_partitions(mut self) -> Self {
        self.all_partitions = true;
        self
    }

    pub fn with_from_failure(mut self, from_failure: bool) -> Self {
        self.from_failure = from_failure;
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// Outcome of a successful launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedBackfill {
    pub backfill_id: BackfillId,
    pub launched_run_ids: Vec<Uuid>,
}

/// Validate `params`, persist the backfill and return its id
///
/// Nothing is persisted when validation fails.
#[instrument(skip(ctx, params), fields(read_only = ctx.read_only()))]
pub async fn launch_backfill(
    ctx: &WorkspaceContext,
    params: LaunchBackfillParams,
) -> Result<LaunchedBackfill> {
    let backfill = match build_backfill(ctx, params) {
        Ok(backfill) => backfill,
        Err(e) => {
            BACKFILL_LAUNCH_REJECTIONS_TOTAL
                .with_label_values(&[e.rejection_reason()])
                .inc();
            warn!(error = %e, "Rejected backfill launch");
            return Err(e);
        }
    };

    ctx.storage().add_backfill(&backfill).await?;

    let kind = if backfill.is_asset_backfill() {
        "asset"
    } else {
        "job"
    };
    BACKFILLS_LAUNCHED_TOTAL.with_label_values(&[kind]).inc();
    info!(
        backfill_id = %backfill.backfill_id,
        kind,
        from_failure = backfill.from_failure,
        "Backfill requested"
    );

    Ok(LaunchedBackfill {
        backfill_id: backfill.backfill_id,
        launched_run_ids: Vec::new(),
    })
}

fn build_backfill(
    ctx: &WorkspaceContext,
    params: LaunchBackfillParams,
) -> Result<PartitionBackfill> {
    ctx.assert_permission(Permission::LaunchPartitionBackfill)?;

    let tags = validate_tags(&params.tags)?;
    if params.all_partitions && !params.partition_names.is_empty() {
        return Err(crate::Error::InvalidParams(
            "allPartitions cannot be combined with explicit partition names".to_string(),
        ));
    }

    match (params.asset_selection, params.selector) {
        (Some(asset_selection), None) => build_asset_backfill(
            ctx,
            asset_selection,
            &params.partition_names,
            params.all_partitions,
            tags,
            params.from_failure,
        ),
        (None, Some(selector)) => build_partition_set_backfill(
            ctx,
            &selector,
            params.partition_names,
            params.all_partitions,
            tags,
            params.from_failure,
        ),
        (None, None) => Err(crate::Error::InvalidParams(
            "Backfill requires either an asset selection or a partition set selector".to_string(),
        )),
        (Some(_), Some(_)) => Err(crate::Error::InvalidParams(
            "Backfill cannot specify both an asset selection and a partition set selector"
                .to_string(),
        )),
    }
}

fn build_asset_backfill(
    ctx: &WorkspaceContext,
    asset_selection: Vec<AssetKey>,
    partition_names: &[String],
    all_partitions: bool,
    tags: BTreeMap<String, String>,
    from_failure: bool,
) -> Result<PartitionBackfill> {
    if asset_selection.is_empty() {
        return Err(crate::Error::InvalidParams(
            "Asset selection must not be empty".to_string(),
        ));
    }

    let asset_graph = ctx.repository().asset_graph();
    let missing = asset_graph.missing_keys(&asset_selection);
    if !missing.is_empty() {
        return Err(crate::Error::InvalidParams(
            strata_core::Error::UnknownAssets(missing).to_string(),
        ));
    }

    let data = if all_partitions {
        AssetBackfillData::from_asset_selection_all_partitions(asset_graph, &asset_selection)?
    } else {
        AssetBackfillData::from_asset_partitions(asset_graph, partition_names, &asset_selection)?
    };

    Ok(PartitionBackfill::for_assets(
        asset_selection,
        &data,
        tags,
        from_failure,
    )?)
}

fn build_partition_set_backfill(
    ctx: &WorkspaceContext,
    selector: &PartitionSetSelector,
    partition_names: Vec<String>,
    all_partitions: bool,
    tags: BTreeMap<String, String>,
    from_failure: bool,
) -> Result<PartitionBackfill> {
    let repository = ctx.repository();
    let not_found = || {
        crate::Error::PartitionSetNotFound(format!(
            "{} in {}@{}",
            selector.partition_set_name,
            selector.repository_name,
            selector.repository_location_name
        ))
    };

    if !repository.matches(&selector.repository_name, &selector.repository_location_name) {
        return Err(not_found());
    }
    let partition_set = repository
        .partition_set(&selector.partition_set_name)
        .ok_or_else(not_found)?;
    let origin = repository
        .partition_set_origin(&selector.partition_set_name)
        .ok_or_else(not_found)?;

    let partition_names = if all_partitions {
        partition_set.partitions_def.partition_keys()
    } else {
        let unknown: Vec<&str> = partition_names
            .iter()
            .filter(|name| !partition_set.partitions_def.has_partition_key(name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(crate::Error::InvalidParams(format!(
                "Partitions not found in partition set {}: {}",
                partition_set.name,
                unknown.join(", ")
            )));
        }
        let mut seen = BTreeSet::new();
        partition_names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect()
    };

    Ok(PartitionBackfill::for_partition_set(
        origin,
        partition_names,
        tags,
        from_failure,
    ))
}

fn validate_tags(tags: &[(String, String)]) -> Result<BTreeMap<String, String>> {
    let mut validated = BTreeMap::new();
    for (key, value) in tags {
        if key.trim().is_empty() {
            return Err(crate::Error::InvalidParams(
                "Tag keys must not be empty".to_string(),
            ));
        }
        if key.starts_with(SYSTEM_TAG_PREFIX) {
            return Err(crate::Error::InvalidParams(format!(
                "Tag key {} uses the reserved prefix {}",
                key, SYSTEM_TAG_PREFIX
            )));
        }
        if validated.insert(key.clone(), value.clone()).is_some() {
            return Err(crate::Error::InvalidParams(format!(
                "Duplicate tag key {}",
                key
            )));
        }
    }
    Ok(validated)
}

/// Cancel a backfill
///
/// Runs that have not started are cancelled outright and running ones are
/// asked to cancel. The backfill becomes `CANCELING` while any run is still
/// winding down, `CANCELED` otherwise. Returns the new status.
///
/// The final status write only applies if the backfill still has the status
/// read at the start; a concurrent change makes this an `InvalidState` error.
#[instrument(skip(ctx), fields(backfill_id = %backfill_id))]
pub async fn cancel_backfill(
    ctx: &WorkspaceContext,
    backfill_id: BackfillId,
) -> Result<BulkActionStatus> {
    ctx.assert_permission(Permission::CancelPartitionBackfill)?;

    let storage = ctx.storage();
    let backfill = storage
        .get_backfill(backfill_id)
        .await?
        .ok_or_else(|| crate::Error::BackfillNotFound(backfill_id.to_string()))?;

    if backfill.status.is_terminal() {
        return Err(crate::Error::InvalidState(format!(
            "Backfill {} is already {}",
            backfill_id, backfill.status
        )));
    }

    let mut in_flight = false;
    for run in storage.get_runs_for_backfill(backfill_id).await? {
        match run.status {
            RunStatus::Queued | RunStatus::NotStarted => {
                storage
                    .update_run_status(run.run_id, RunStatus::Canceled)
                    .await?;
            }
            RunStatus::Starting | RunStatus::Started => {
                storage
                    .update_run_status(run.run_id, RunStatus::Canceling)
                    .await?;
                in_flight = true;
            }
            RunStatus::Canceling => in_flight = true,
            RunStatus::Success | RunStatus::Failure | RunStatus::Canceled => {}
        }
    }

    let status = if in_flight {
        BulkActionStatus::Canceling
    } else {
        BulkActionStatus::Canceled
    };
    let previous = backfill.status;
    match storage
        .update_backfill_if_status(&backfill.with_status(status), previous)
        .await
    {
        Err(strata_storage::Error::Conflict(message)) => {
            warn!(%message, "Backfill changed while cancelling");
            return Err(crate::Error::InvalidState(message));
        }
        other => other?,
    }

    BACKFILL_CANCELLATIONS_TOTAL
        .with_label_values(&[status.as_str()])
        .inc();
    info!(status = %status, "Backfill cancellation requested");

    Ok(status)
}
