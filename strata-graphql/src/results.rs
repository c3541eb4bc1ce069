//! Typed mutation and query results
//!
//! Domain failures are returned as members of these unions rather than as
//! GraphQL errors, so clients can branch on `__typename`.

use crate::types::{GqlBulkActionStatus, GqlPartitionBackfill, PartitionBackfills};
use async_graphql::{SimpleObject, Union};
use std::error::Error as StdError;
use strata_runtime::{Error, LaunchedBackfill};
use tracing::error;

#[derive(Debug, Clone, SimpleObject)]
pub struct LaunchBackfillSuccess {
    pub backfill_id: String,
    pub launched_run_ids: Vec<String>,
}

impl From<LaunchedBackfill> for LaunchBackfillSuccess {
    fn from(launched: LaunchedBackfill) -> Self {
        Self {
            backfill_id: launched.backfill_id.to_string(),
            launched_run_ids: launched
                .launched_run_ids
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, SimpleObject)]
pub struct CancelBackfillSuccess {
    pub backfill_id: String,
    pub status: GqlBulkActionStatus,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct UnauthorizedError {
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct PartitionSetNotFoundError {
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct InvalidBackfillParamsError {
    pub message: String,
}

#[derive(Debug, Clone, SimpleObject)]
pub struct BackfillNotFoundError {
    pub message: String,
    pub backfill_id: String,
}

/// Any other failure, with the chain of underlying causes in `stack`
#[derive(Debug, Clone, SimpleObject)]
pub struct BackfillError {
    pub message: String,
    pub stack: Vec<String>,
}

impl BackfillError {
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        error!(error = %err, "Backfill operation failed");
        let mut stack = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            stack.push(cause.to_string());
            source = cause.source();
        }
        Self {
            message: err.to_string(),
            stack,
        }
    }
}

fn not_found(backfill_id: String) -> BackfillNotFoundError {
    BackfillNotFoundError {
        message: format!("Backfill {} could not be found", backfill_id),
        backfill_id,
    }
}

#[derive(Debug, Clone, Union)]
pub enum LaunchBackfillResult {
    LaunchBackfillSuccess(LaunchBackfillSuccess),
    UnauthorizedError(UnauthorizedError),
    PartitionSetNotFoundError(PartitionSetNotFoundError),
    InvalidBackfillParamsError(InvalidBackfillParamsError),
    BackfillError(BackfillError),
}

impl From<strata_runtime::Result<LaunchedBackfill>> for LaunchBackfillResult {
    fn from(result: strata_runtime::Result<LaunchedBackfill>) -> Self {
        match result {
            Ok(launched) => Self::LaunchBackfillSuccess(launched.into()),
            Err(Error::Unauthorized(message)) => {
                Self::UnauthorizedError(UnauthorizedError { message })
            }
            Err(Error::PartitionSetNotFound(message)) => {
                Self::PartitionSetNotFoundError(PartitionSetNotFoundError { message })
            }
            Err(Error::InvalidParams(message)) => {
                Self::InvalidBackfillParamsError(InvalidBackfillParamsError { message })
            }
            Err(e) => Self::BackfillError(BackfillError::from_error(&e)),
        }
    }
}

#[derive(Debug, Clone, Union)]
pub enum PartitionBackfillsOrError {
    PartitionBackfills(PartitionBackfills),
    BackfillError(BackfillError),
}

#[derive(Debug, Clone, Union)]
pub enum PartitionBackfillOrError {
    PartitionBackfill(GqlPartitionBackfill),
    BackfillNotFoundError(BackfillNotFoundError),
    BackfillError(BackfillError),
}

impl PartitionBackfillOrError {
    pub fn not_found(backfill_id: impl Into<String>) -> Self {
        Self::BackfillNotFoundError(not_found(backfill_id.into()))
    }
}

impl From<strata_runtime::Result<strata_runtime::BackfillSummary>> for PartitionBackfillOrError {
    fn from(result: strata_runtime::Result<strata_runtime::BackfillSummary>) -> Self {
        match result {
            Ok(summary) => Self::PartitionBackfill(GqlPartitionBackfill(summary)),
            Err(Error::BackfillNotFound(id)) => Self::not_found(id),
            Err(e) => Self::BackfillError(BackfillError::from_error(&e)),
        }
    }
}

#[derive(Debug, Clone, Union)]
pub enum CancelBackfillResult {
    CancelBackfillSuccess(CancelBackfillSuccess),
    UnauthorizedError(UnauthorizedError),
    BackfillNotFoundError(BackfillNotFoundError),
    BackfillError(BackfillError),
}

impl CancelBackfillResult {
    pub fn not_found(backfill_id: impl Into<String>) -> Self {
        Self::BackfillNotFoundError(not_found(backfill_id.into()))
    }

    pub fn from_result(
        backfill_id: String,
        result: strata_runtime::Result<strata_core::BulkActionStatus>,
    ) -> Self {
        match result {
            Ok(status) => Self::CancelBackfillSuccess(CancelBackfillSuccess {
                backfill_id,
                status: status.into(),
            }),
            Err(Error::Unauthorized(message)) => {
                Self::UnauthorizedError(UnauthorizedError { message })
            }
            Err(Error::BackfillNotFound(id)) => Self::not_found(id),
            Err(e) => Self::BackfillError(BackfillError::from_error(&e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_stack_follows_sources() {
        let err = Error::Storage(strata_storage::Error::Corrupt(
            strata_core::Error::UnknownStatus("exploded".to_string()),
        ));
        let backfill_error = BackfillError::from_error(&err);

        assert!(backfill_error.message.starts_with("Storage error"));
        assert_eq!(backfill_error.stack.len(), 2);
        assert!(backfill_error.stack[1].contains("exploded"));
    }

    #[test]
    fn test_launch_errors_map_to_typed_results() {
        let result: LaunchBackfillResult =
            Err(Error::Unauthorized("read-only".to_string())).into();
        assert!(matches!(result, LaunchBackfillResult::UnauthorizedError(_)));

        let result: LaunchBackfillResult =
            Err(Error::InvalidParams("bad".to_string())).into();
        assert!(matches!(
            result,
            LaunchBackfillResult::InvalidBackfillParamsError(_)
        ));

        let result: LaunchBackfillResult =
            Err(Error::Storage(strata_storage::Error::PoolExhausted("boom".to_string()))).into();
        assert!(matches!(result, LaunchBackfillResult::BackfillError(_)));
    }

    #[test]
    fn test_cancel_results() {
        let result = CancelBackfillResult::from_result(
            "id".to_string(),
            Err(Error::InvalidState("already canceled".to_string())),
        );
        assert!(matches!(result, CancelBackfillResult::BackfillError(_)));

        let result = CancelBackfillResult::from_result(
            "id".to_string(),
            Ok(strata_core::BulkActionStatus::Canceled),
        );
        match result {
            CancelBackfillResult::CancelBackfillSuccess(success) => {
                assert_eq!(success.status, GqlBulkActionStatus::Canceled)
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
