//! PostgreSQL storage implementation

use crate::models::{BackfillModel, RunModel};
use crate::store::{BackfillFilters, Storage};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use futures::future::BoxFuture;
use sqlx::{postgres::PgPoolOptions, PgPool, Postgres, Transaction};
use std::time::Instant;
use strata_core::{BackfillId, BulkActionStatus, PartitionBackfill, RunRecord, RunStatus};
use tracing::{error, instrument, warn};
use uuid::Uuid;

/// Configuration for the PostgreSQL connection pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: Option<u64>,
    pub max_lifetime_secs: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: None,
            max_lifetime_secs: None,
        }
    }
}

impl PoolConfig {
    fn validate(&self) -> Result<()> {
        if self.min_connections == 0 {
            return Err(crate::Error::ValidationError(
                "min_connections must be > 0".to_string(),
            ));
        }
        if self.max_connections == 0 || self.max_connections < self.min_connections {
            return Err(crate::Error::ValidationError(
                "max_connections must be >= min_connections and > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// PostgreSQL storage backend
pub struct PostgresStorage {
    pool: PgPool,
}

const BACKFILL_COLUMNS: &str =
    "id, status, created_at, target, from_failure, tags, error_message";

const RUN_COLUMNS: &str = "id, backfill_id, partition_key, status, tags, created_at, updated_at";

impl PostgresStorage {
    /// Connect with the default pool configuration
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_pool_config(database_url, PoolConfig::default()).await
    }

    /// Connect using a [`PoolConfig`]
    pub async fn with_pool_config(database_url: &str, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        let mut opts = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.acquire_timeout_secs));

        if let Some(idle) = config.idle_timeout_secs {
            opts = opts.idle_timeout(std::time::Duration::from_secs(idle));
        }
        if let Some(max_life) = config.max_lifetime_secs {
            opts = opts.max_lifetime(std::time::Duration::from_secs(max_life));
        }

        let pool = opts.connect(database_url).await.map_err(map_db_error)?;
        Ok(Self { pool })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply pending schema migrations
    pub async fn migrate(&self) -> Result<()> {
        crate::migrations::run_migrations(&self.pool).await
    }

    /// Run `f` inside a transaction, committing on success and rolling back on error
    async fn with_transaction<F, T>(&self, operation: &'static str, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c mut Transaction<'_, Postgres>) -> BoxFuture<'c, Result<T>> + Send,
        T: Send,
    {
        let start = Instant::now();
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let result = match f(&mut tx).await {
            Ok(result) => {
                tx.commit().await.map_err(map_db_error)?;
                Ok(result)
            }
            Err(e) => {
                tx.rollback().await.map_err(map_db_error)?;
                Err(e)
            }
        };

        let elapsed = start.elapsed();
        if elapsed.as_millis() > 100 {
            warn!(
                operation,
                duration_ms = elapsed.as_millis(),
                "Slow database operation detected"
            );
        }

        result
    }
}

#[async_trait]
impl Storage for PostgresStorage {
    #[instrument(
        skip(self, backfill),
        fields(
            db.system = "postgresql",
            db.operation = "INSERT",
            db.sql.table = "backfills",
            backfill_id = %backfill.backfill_id
        )
    )]
    async fn add_backfill(&self, backfill: &PartitionBackfill) -> Result<()> {
        let row = BackfillModel::from(backfill);
        sqlx::query(
            r#"
            INSERT INTO backfills (id, status, created_at, target, from_failure, tags, error_message)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.id)
        .bind(&row.status)
        .bind(row.created_at)
        .bind(&row.target)
        .bind(row.from_failure)
        .bind(&row.tags)
        .bind(&row.error_message)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = "backfills",
            backfill_id = %backfill_id
        )
    )]
    async fn get_backfill(&self, backfill_id: BackfillId) -> Result<Option<PartitionBackfill>> {
        let row: Option<BackfillModel> = sqlx::query_as(&format!(
            "SELECT {} FROM backfills WHERE id = $1",
            BACKFILL_COLUMNS
        ))
        .bind(backfill_id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(PartitionBackfill::try_from).transpose()
    }

    #[instrument(
        skip(self),
        fields(db.system = "postgresql", db.operation = "SELECT", db.sql.table = "backfills")
    )]
    async fn get_backfills(&self, filters: &BackfillFilters) -> Result<Vec<PartitionBackfill>> {
        filters.validate()?;
        let status = filters.status.map(|s| s.as_str().to_string());
        let cursor = filters.cursor;
        let limit = filters.limit.map(|l| l as i64);

        let rows = self
            .with_transaction("list_backfills", move |tx| {
                Box::pin(async move {
                    let before_seq: Option<i64> = match cursor {
                        Some(cursor) => {
                            let seq: Option<i64> =
                                sqlx::query_scalar("SELECT seq FROM backfills WHERE id = $1")
                                    .bind(cursor.0)
                                    .fetch_optional(&mut **tx)
                                    .await
                                    .map_err(map_db_error)?;
                            Some(seq.ok_or_else(|| {
                                crate::Error::NotFound(format!("Backfill cursor {}", cursor))
                            })?)
                        }
                        None => None,
                    };

                    let rows: Vec<BackfillModel> = sqlx::query_as(&format!(
                        r#"
                        SELECT {}
                        FROM backfills
                        WHERE ($1::TEXT IS NULL OR status = $1)
                          AND ($2::BIGINT IS NULL OR seq < $2)
                        ORDER BY seq DESC
                        LIMIT $3
                        "#,
                        BACKFILL_COLUMNS
                    ))
                    .bind(status)
                    .bind(before_seq)
                    .bind(limit)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(map_db_error)?;

                    Ok(rows)
                })
            })
            .await?;

        rows.into_iter().map(PartitionBackfill::try_from).collect()
    }

    #[instrument(
        skip(self, backfill),
        fields(
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.sql.table = "backfills",
            backfill_id = %backfill.backfill_id
        )
    )]
    async fn update_backfill(&self, backfill: &PartitionBackfill) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE backfills
            SET status = $2, error_message = $3
            WHERE id = $1
            "#,
        )
        .bind(backfill.backfill_id.0)
        .bind(backfill.status.as_str())
        .bind(&backfill.error)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::NotFound(format!(
                "Backfill {}",
                backfill.backfill_id
            )));
        }
        Ok(())
    }

    #[instrument(
        skip(self, backfill),
        fields(
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.sql.table = "backfills",
            backfill_id = %backfill.backfill_id,
            expected = %expected
        )
    )]
    async fn update_backfill_if_status(
        &self,
        backfill: &PartitionBackfill,
        expected: BulkActionStatus,
    ) -> Result<()> {
        let backfill_id = backfill.backfill_id;
        let status = backfill.status.as_str();
        let error_message = backfill.error.clone();

        self.with_transaction("update_backfill_if_status", move |tx| {
            Box::pin(async move {
                let result = sqlx::query(
                    r#"
                    UPDATE backfills
                    SET status = $2, error_message = $3
                    WHERE id = $1 AND status = $4
                    "#,
                )
                .bind(backfill_id.0)
                .bind(status)
                .bind(&error_message)
                .bind(expected.as_str())
                .execute(&mut **tx)
                .await
                .map_err(map_db_error)?;

                if result.rows_affected() > 0 {
                    return Ok(());
                }

                let current: Option<String> =
                    sqlx::query_scalar("SELECT status FROM backfills WHERE id = $1")
                        .bind(backfill_id.0)
                        .fetch_optional(&mut **tx)
                        .await
                        .map_err(map_db_error)?;

                Err(match current {
                    Some(current) => crate::Error::Conflict(format!(
                        "Backfill {} is {}, expected {}",
                        backfill_id, current, expected
                    )),
                    None => crate::Error::NotFound(format!("Backfill {}", backfill_id)),
                })
            })
        })
        .await
    }

    #[instrument(
        skip(self, run),
        fields(
            db.system = "postgresql",
            db.operation = "INSERT",
            db.sql.table = "runs",
            run_id = %run.run_id
        )
    )]
    async fn add_run(&self, run: &RunRecord) -> Result<()> {
        let row = RunModel::from(run);
        sqlx::query(
            r#"
            INSERT INTO runs (id, backfill_id, partition_key, status, tags, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(row.id)
        .bind(&row.backfill_id)
        .bind(&row.partition_key)
        .bind(&row.status)
        .bind(&row.tags)
        .bind(row.created_at)
        .bind(row.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(
            db.system = "postgresql",
            db.operation = "UPDATE",
            db.sql.table = "runs",
            run_id = %run_id
        )
    )]
    async fn update_run_status(&self, run_id: Uuid, status: RunStatus) -> Result<()> {
        let result = sqlx::query("UPDATE runs SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(run_id)
            .bind(status.as_str())
            .bind(Utc::now())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::NotFound(format!("Run {}", run_id)));
        }
        Ok(())
    }

    #[instrument(
        skip(self),
        fields(
            db.system = "postgresql",
            db.operation = "SELECT",
            db.sql.table = "runs",
            backfill_id = %backfill_id
        )
    )]
    async fn get_runs_for_backfill(&self, backfill_id: BackfillId) -> Result<Vec<RunRecord>> {
        let rows: Vec<RunModel> = sqlx::query_as(&format!(
            "SELECT {} FROM runs WHERE backfill_id = $1 ORDER BY seq ASC",
            RUN_COLUMNS
        ))
        .bind(backfill_id.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(RunRecord::try_from).collect()
    }
}

/// Map sqlx errors onto storage errors by PostgreSQL error code
fn map_db_error(err: sqlx::Error) -> crate::Error {
    match &err {
        sqlx::Error::PoolTimedOut => {
            error!(error = %err, "Connection pool timed out");
            return crate::Error::PoolExhausted("Connection pool timed out".to_string());
        }
        sqlx::Error::PoolClosed => {
            error!(error = %err, "Connection pool closed");
            return crate::Error::ConnectionFailed("Connection pool closed".to_string());
        }
        _ => {}
    }

    if let sqlx::Error::Database(db_err) = &err {
        if let Some(code) = db_err.code().as_deref() {
            match code {
                // unique_violation
                "23505" => {
                    warn!(
                        error_code = code,
                        message = db_err.message(),
                        "Unique constraint violation"
                    );
                    return crate::Error::AlreadyExists(db_err.message().to_string());
                }
                // check_violation, raised for unknown status strings
                "23514" => {
                    warn!(
                        error_code = code,
                        message = db_err.message(),
                        "CHECK constraint violation"
                    );
                    return crate::Error::ValidationError(format!(
                        "Constraint violation: {}",
                        db_err.message()
                    ));
                }
                "53300" => {
                    error!(
                        error_code = code,
                        message = db_err.message(),
                        "Database connection limit reached"
                    );
                    return crate::Error::PoolExhausted(db_err.message().to_string());
                }
                "08006" | "08001" | "08003" | "08004" => {
                    error!(
                        error_code = code,
                        message = db_err.message(),
                        "Database connection failed"
                    );
                    return crate::Error::ConnectionFailed(db_err.message().to_string());
                }
                _ => {
                    error!(
                        error_code = code,
                        message = db_err.message(),
                        "Unexpected database error"
                    );
                }
            }
        }
    }

    crate::Error::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_config_validation() {
        assert!(PoolConfig::default().validate().is_ok());

        let zero_min = PoolConfig {
            min_connections: 0,
            ..PoolConfig::default()
        };
        assert!(zero_min.validate().is_err());

        let inverted = PoolConfig {
            max_connections: 1,
            min_connections: 2,
            ..PoolConfig::default()
        };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_pool_errors_are_mapped() {
        assert!(matches!(
            map_db_error(sqlx::Error::PoolTimedOut),
            crate::Error::PoolExhausted(_)
        ));
        assert!(matches!(
            map_db_error(sqlx::Error::PoolClosed),
            crate::Error::ConnectionFailed(_)
        ));
        assert!(matches!(
            map_db_error(sqlx::Error::RowNotFound),
            crate::Error::Database(_)
        ));
    }
}
