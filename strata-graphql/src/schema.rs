//! Query and mutation roots

use crate::inputs::LaunchBackfillParamsInput;
use crate::results::{
    BackfillError, CancelBackfillResult, LaunchBackfillResult, PartitionBackfillOrError,
    PartitionBackfillsOrError,
};
use crate::types::{GqlBulkActionStatus, GqlPartitionBackfill, PartitionBackfills};
use async_graphql::{Context, EmptySubscription, Object, Result, Schema};
use strata_core::BackfillId;
use strata_runtime::{LaunchBackfillParams, Permission, WorkspaceContext};
use strata_storage::BackfillFilters;

pub type StrataSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema
///
/// The [`WorkspaceContext`] is not part of the schema; attach one to every
/// request with `Request::data`.
pub fn build_schema() -> StrataSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription).finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Backfills, newest first
    async fn partition_backfills_or_error(
        &self,
        ctx: &Context<'_>,
        status: Option<GqlBulkActionStatus>,
        #[graphql(desc = "Id of the last backfill of the previous page")] cursor: Option<String>,
        limit: Option<i32>,
    ) -> Result<PartitionBackfillsOrError> {
        let workspace = ctx.data::<WorkspaceContext>()?;

        let mut filters = BackfillFilters::new();
        if let Some(status) = status {
            filters = filters.status(status.into());
        }
        if let Some(cursor) = cursor {
            match cursor.parse::<BackfillId>() {
                Ok(id) => filters = filters.cursor(id),
                Err(e) => {
                    return Ok(PartitionBackfillsOrError::BackfillError(
                        BackfillError::from_error(&e),
                    ))
                }
            }
        }
        if let Some(limit) = limit {
            // Negative limits fail validation as zero
            filters = filters.limit(usize::try_from(limit).unwrap_or(0));
        }

        Ok(
            match strata_runtime::get_backfills(workspace, &filters).await {
                Ok(summaries) => PartitionBackfillsOrError::PartitionBackfills(PartitionBackfills {
                    results: summaries.into_iter().map(GqlPartitionBackfill).collect(),
                }),
                Err(e) => PartitionBackfillsOrError::BackfillError(BackfillError::from_error(&e)),
            },
        )
    }

    async fn partition_backfill_or_error(
        &self,
        ctx: &Context<'_>,
        backfill_id: String,
    ) -> Result<PartitionBackfillOrError> {
        let workspace = ctx.data::<WorkspaceContext>()?;
        let Ok(id) = backfill_id.parse::<BackfillId>() else {
            return Ok(PartitionBackfillOrError::not_found(backfill_id));
        };
        Ok(strata_runtime::get_backfill(workspace, id).await.into())
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn launch_partition_backfill(
        &self,
        ctx: &Context<'_>,
        backfill_params: LaunchBackfillParamsInput,
    ) -> Result<LaunchBackfillResult> {
        let workspace = ctx.data::<WorkspaceContext>()?;
        let result = match LaunchBackfillParams::try_from(backfill_params) {
            Ok(params) => strata_runtime::launch_backfill(workspace, params).await,
            Err(e) => Err(e),
        };
        Ok(result.into())
    }

    async fn cancel_partition_backfill(
        &self,
        ctx: &Context<'_>,
        backfill_id: String,
    ) -> Result<CancelBackfillResult> {
        let workspace = ctx.data::<WorkspaceContext>()?;
        if let Err(e) = workspace.assert_permission(Permission::CancelPartitionBackfill) {
            return Ok(CancelBackfillResult::from_result(backfill_id, Err(e)));
        }
        let Ok(id) = backfill_id.parse::<BackfillId>() else {
            return Ok(CancelBackfillResult::not_found(backfill_id));
        };
        Ok(CancelBackfillResult::from_result(
            backfill_id,
            strata_runtime::cancel_backfill(workspace, id).await,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use strata_core::Repository;
    use strata_storage::InMemoryStorage;

    #[test]
    fn test_sdl_exposes_result_unions() {
        let sdl = build_schema().sdl();
        for expected in [
            "union LaunchBackfillResult",
            "union PartitionBackfillsOrError",
            "union PartitionBackfillOrError",
            "union CancelBackfillResult",
            "type InvalidBackfillParamsError",
            "type BackfillNotFoundError",
            "input LaunchBackfillParams",
        ] {
            assert!(sdl.contains(expected), "missing `{}` in schema", expected);
        }
    }

    #[tokio::test]
    async fn test_bad_cursor_is_backfill_error() {
        let workspace = WorkspaceContext::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(Repository::empty()),
        );
        let response = crate::execute(
            &build_schema(),
            workspace,
            r#"{ partitionBackfillsOrError(cursor: "nope") { __typename } }"#,
        )
        .await;

        assert!(response.errors.is_empty(), "{:?}", response.errors);
        assert_eq!(
            response.data.into_json().unwrap(),
            json!({ "partitionBackfillsOrError": { "__typename": "BackfillError" } })
        );
    }

    #[tokio::test]
    async fn test_missing_workspace_is_graphql_error() {
        let response = build_schema()
            .execute(r#"{ partitionBackfillsOrError { __typename } }"#)
            .await;
        assert_eq!(response.errors.len(), 1);
    }
}
