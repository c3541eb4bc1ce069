//! Server configuration
//!
//! Every option can be given as a flag or through its environment variable.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use strata_core::{Repository, RepositoryDefinition};
use strata_storage::PoolConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "strata-server")]
#[command(version, about = "Strata backfill GraphQL server", long_about = None)]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "STRATA_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    /// PostgreSQL connection string; backfills are kept in memory when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Reject launches and cancellations
    #[arg(long, env = "STRATA_READ_ONLY")]
    pub read_only: bool,

    /// JSON file with the repository definition to serve
    #[arg(long, env = "STRATA_DEFINITIONS")]
    pub definitions: Option<PathBuf>,

    /// Maximum PostgreSQL pool connections
    #[arg(long, env = "STRATA_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Seconds to wait for a pooled connection
    #[arg(long, env = "STRATA_DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 30)]
    pub db_acquire_timeout_secs: u64,

    /// Do not apply schema migrations at startup
    #[arg(long, env = "STRATA_SKIP_MIGRATIONS")]
    pub skip_migrations: bool,

    /// Per-request timeout in seconds
    #[arg(long, env = "STRATA_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        if let Some(url) = &self.database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                return Err(anyhow!(
                    "DATABASE_URL must be a postgres:// or postgresql:// URL, got: {}",
                    mask_password(url)
                ));
            }
        }

        if self.db_max_connections == 0 {
            return Err(anyhow!("STRATA_DB_MAX_CONNECTIONS must be greater than 0"));
        }
        if self.request_timeout_secs == 0 {
            return Err(anyhow!("STRATA_REQUEST_TIMEOUT_SECS must be greater than 0"));
        }

        if let Some(path) = &self.definitions {
            if !path.is_file() {
                return Err(anyhow!(
                    "STRATA_DEFINITIONS does not point to a file: {}",
                    path.display()
                ));
            }
        }

        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_addr
            .parse()
            .with_context(|| format!("STRATA_BIND_ADDR is not a socket address: {}", self.bind_addr))
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_connections: self.db_max_connections,
            acquire_timeout_secs: self.db_acquire_timeout_secs,
            ..PoolConfig::default()
        }
    }

    /// Load the repository to serve; empty when no definitions file is set
    pub fn load_repository(&self) -> Result<Repository> {
        let Some(path) = &self.definitions else {
            return Ok(Repository::empty());
        };

        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read definitions from {}", path.display()))?;
        RepositoryDefinition::from_json(&json)
            .and_then(RepositoryDefinition::into_repository)
            .with_context(|| format!("Invalid definitions in {}", path.display()))
    }
}

/// Mask password in database URL for logging
pub fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let mut masked = url.to_string();
            masked.replace_range(colon_pos + 1..at_pos, "****");
            return masked;
        }
    }
    url.to_string()
}
