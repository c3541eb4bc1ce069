//! Strata server library
//!
//! Configuration and HTTP handlers for the `strata-server` binary.

pub mod config;
pub mod handler;
