//! # Strata GraphQL
//!
//! GraphQL surface for backfills: `launchPartitionBackfill`,
//! `cancelPartitionBackfill`, `partitionBackfillsOrError` and
//! `partitionBackfillOrError`. Every request carries its own
//! [`WorkspaceContext`].

pub mod inputs;
pub mod results;
pub mod schema;
pub mod types;

pub use schema::{build_schema, MutationRoot, QueryRoot, StrataSchema};

use async_graphql::{Request, Response};
use strata_runtime::WorkspaceContext;

/// Execute `request` against `schema` with `workspace` as its context
pub async fn execute(
    schema: &StrataSchema,
    workspace: WorkspaceContext,
    request: impl Into<Request>,
) -> Response {
    schema.execute(request.into().data(workspace)).await
}
