//! # Strata Storage
//!
//! Persistence for backfill records and the runs they spawn. The [`Storage`]
//! trait is implemented by an in-memory store (tests, single-process use)
//! and by a PostgreSQL store.

pub mod memory;
pub mod migrations;
pub mod models;
pub mod postgres;
pub mod store;

// Re-export commonly used types
pub use memory::InMemoryStorage;
pub use models::{BackfillModel, RunModel};
pub use postgres::{PoolConfig, PostgresStorage};
pub use store::{BackfillFilters, Storage, MAX_PAGE_SIZE};

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for storage operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Corrupt record: {0}")]
    Corrupt(#[from] strata_core::Error),

    #[error("Connection pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}
