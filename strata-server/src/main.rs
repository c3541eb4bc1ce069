//! Strata server
//!
//! HTTP server exposing the backfill GraphQL API.
//!
//! # Endpoints
//!
//! - POST /graphql - GraphQL queries and mutations
//! - GET /health - Health check
//! - GET /metrics - Prometheus metrics
//!
//! # Configuration
//!
//! See `strata-server --help`. Every flag has an environment variable
//! counterpart (`STRATA_BIND_ADDR`, `DATABASE_URL`, `STRATA_READ_ONLY`,
//! `STRATA_DEFINITIONS`, ...).

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use strata_runtime::WorkspaceContext;
use strata_server::config::{mask_password, ServerConfig};
use strata_server::handler::{router, AppState};
use strata_storage::{InMemoryStorage, PostgresStorage, Storage};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "strata_server=info,strata_runtime=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    if let Err(e) = run(ServerConfig::parse()).await {
        error!(error = %format!("{:#}", e), "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: ServerConfig) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let addr = config.socket_addr()?;

    info!(
        bind_addr = %addr,
        database_url = ?config.database_url.as_deref().map(mask_password),
        read_only = config.read_only,
        "Starting Strata server"
    );

    let repository = config.load_repository()?;
    info!(
        repository = %repository.origin().id(),
        assets = repository.asset_graph().len(),
        partition_sets = repository.partition_sets().count(),
        "Definitions loaded"
    );

    let storage = open_storage(&config).await?;
    let workspace = WorkspaceContext::new(storage, Arc::new(repository))
        .with_read_only(config.read_only);

    let state = AppState {
        schema: strata_graphql::build_schema(),
        workspace,
    };
    let app = router(state, Duration::from_secs(config.request_timeout_secs));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down gracefully");
    Ok(())
}

async fn open_storage(config: &ServerConfig) -> Result<Arc<dyn Storage>> {
    let Some(url) = &config.database_url else {
        warn!("DATABASE_URL not set; backfills are kept in memory and lost on exit");
        return Ok(Arc::new(InMemoryStorage::new()));
    };

    let storage = PostgresStorage::with_pool_config(url, config.pool_config())
        .await
        .context("Failed to initialize storage")?;

    if config.skip_migrations {
        info!("Skipping schema migrations");
    } else {
        storage.migrate().await.context("Failed to run migrations")?;
        info!("Schema migrations applied");
    }

    Ok(Arc::new(storage))
}

/// Waits for SIGTERM or Ctrl-C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl-C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
