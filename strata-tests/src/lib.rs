//! Shared test utilities for Strata crates
//!
//! This crate provides:
//! - **Fixtures**: repositories used across backfill tests
//! - **Instance**: an in-memory storage wrapper with run helpers
//! - **GraphQL**: request helpers and the documents clients send
//!
//! # Example
//!
//! ```ignore
//! use strata_tests::{define_context, execute_graphql, fixtures, instance_for_test, queries};
//!
//! #[tokio::test]
//! async fn test_launch() {
//!     let instance = instance_for_test();
//!     let ctx = define_context(&instance, fixtures::get_repo(), false);
//!     let result = execute_graphql(&ctx, queries::LAUNCH_PARTITION_BACKFILL_MUTATION, vars).await;
//!     // ...
//! }
//! ```

pub mod fixtures;
pub mod graphql;
pub mod instance;

// Re-export commonly used items
pub use graphql::{execute_graphql, queries, GraphQLResult};
pub use instance::{define_context, instance_for_test, TestInstance};
