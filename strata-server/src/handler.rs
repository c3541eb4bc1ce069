//! HTTP handlers
//!
//! - POST /graphql - Execute a GraphQL request against the workspace
//! - GET /health - Liveness check
//! - GET /metrics - Prometheus text exposition

use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use prometheus::{Encoder, TextEncoder};
use std::time::Duration;
use strata_graphql::StrataSchema;
use strata_runtime::WorkspaceContext;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::error;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub schema: StrataSchema,
    pub workspace: WorkspaceContext,
}

/// Build the router with all routes and middleware
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/graphql", post(graphql_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(RequestBodyLimitLayer::new(1024 * 1024))
        .with_state(state)
}

/// Execute a GraphQL request with the server's workspace attached
pub async fn graphql_handler(
    State(state): State<AppState>,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = request.into_inner().data(state.workspace.clone());
    state.schema.execute(request).await.into()
}

/// Health check endpoint
pub async fn health_handler() -> &'static str {
    "ok"
}

/// Prometheus metrics endpoint
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use strata_core::Repository;
    use strata_storage::InMemoryStorage;
    use tower::ServiceExt;

    fn app(read_only: bool) -> Router {
        let workspace = WorkspaceContext::new(
            Arc::new(InMemoryStorage::new()),
            Arc::new(Repository::empty()),
        )
        .with_read_only(read_only);
        router(
            AppState {
                schema: strata_graphql::build_schema(),
                workspace,
            },
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let response = app(false)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_metrics() {
        let _ = strata_runtime::metrics::BACKFILLS_LAUNCHED_TOTAL.with_label_values(&["asset"]);
        let response = app(false)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_graphql_uses_server_workspace() {
        let body = json!({
            "query": r#"mutation {
                cancelPartitionBackfill(backfillId: "whatever") { __typename }
            }"#
        });
        let response = app(true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/graphql")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(
            value["data"]["cancelPartitionBackfill"]["__typename"],
            "UnauthorizedError"
        );
    }
}
