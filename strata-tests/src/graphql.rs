//! Executing GraphQL documents in tests

use async_graphql::{Request, Variables};
use serde_json::Value;
use strata_runtime::WorkspaceContext;

/// Outcome of a GraphQL request, flattened to JSON
#[derive(Debug, Clone)]
pub struct GraphQLResult {
    pub data: Value,
    pub errors: Vec<String>,
}

impl GraphQLResult {
    /// Panic unless the request produced data without errors
    pub fn assert_ok(&self) -> &Value {
        assert!(self.errors.is_empty(), "GraphQL errors: {:?}", self.errors);
        &self.data
    }
}

/// Run `query` with `variables` against a fresh schema bound to `ctx`
pub async fn execute_graphql(ctx: &WorkspaceContext, query: &str, variables: Value) -> GraphQLResult {
    let schema = strata_graphql::build_schema();
    let request = Request::new(query).variables(Variables::from_json(variables));
    let response = strata_graphql::execute(&schema, ctx.clone(), request).await;

    GraphQLResult {
        data: response.data.into_json().expect("response data is JSON"),
        errors: response.errors.into_iter().map(|e| e.message).collect(),
    }
}

/// Documents sent by clients
pub mod queries {
    pub const LAUNCH_PARTITION_BACKFILL_MUTATION: &str = r#"
        mutation LaunchPartitionBackfill($backfillParams: LaunchBackfillParams!) {
            launchPartitionBackfill(backfillParams: $backfillParams) {
                __typename
                ... on LaunchBackfillSuccess {
                    backfillId
                    launchedRunIds
                }
                ... on UnauthorizedError {
                    message
                }
                ... on PartitionSetNotFoundError {
                    message
                }
                ... on InvalidBackfillParamsError {
                    message
                }
                ... on BackfillError {
                    message
                    stack
                }
            }
        }
    "#;

    pub const GET_PARTITION_BACKFILLS_QUERY: &str = r#"
        query PartitionBackfills($status: BulkActionStatus, $cursor: String, $limit: Int) {
            partitionBackfillsOrError(status: $status, cursor: $cursor, limit: $limit) {
                __typename
                ... on PartitionBackfills {
                    results {
                        backfillId
                        status
                        numPartitions
                        timestamp
                        partitionNames
                        partitionSetName
                        partitionSet {
                            id
                            name
                            mode
                            pipelineName
                            repositoryOrigin {
                                id
                                repositoryName
                                repositoryLocationName
                            }
                        }
                        isAssetBackfill
                    }
                }
                ... on BackfillError {
                    message
                }
            }
        }
    "#;

    pub const SINGLE_BACKFILL_QUERY: &str = r#"
        query SingleBackfillQuery($backfillId: String!) {
            partitionBackfillOrError(backfillId: $backfillId) {
                __typename
                ... on PartitionBackfill {
                    backfillId
                    status
                    numPartitions
                    timestamp
                    partitionNames
                    partitionSetName
                    partitionSet {
                        id
                        name
                        mode
                        pipelineName
                        repositoryOrigin {
                            id
                            repositoryName
                            repositoryLocationName
                        }
                    }
                    assetSelection {
                        path
                    }
                    isAssetBackfill
                    fromFailure
                    tags {
                        key
                        value
                    }
                    partitionStatuses {
                        results {
                            id
                            partitionName
                            runId
                            runStatus
                        }
                    }
                }
                ... on BackfillNotFoundError {
                    message
                    backfillId
                }
                ... on BackfillError {
                    message
                }
            }
        }
    "#;

    pub const CANCEL_BACKFILL_MUTATION: &str = r#"
        mutation CancelBackfill($backfillId: String!) {
            cancelPartitionBackfill(backfillId: $backfillId) {
                __typename
                ... on CancelBackfillSuccess {
                    backfillId
                    status
                }
                ... on UnauthorizedError {
                    message
                }
                ... on BackfillNotFoundError {
                    message
                }
                ... on BackfillError {
                    message
                }
            }
        }
    "#;
}
