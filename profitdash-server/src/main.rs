//! profitdash server: HTTP API and lifecycle scheduler.
//!
//! Loads configuration (`PROFITDASH_CONFIG`, default `profitdash.toml`),
//! starts the lifecycle scheduler and serves the JSON endpoints until
//! Ctrl-C, then stops the scheduler.
//!
//! # Environment Variables
//!
//! - `PROFITDASH_CONFIG`: configuration file path
//! - `LOG_FORMAT`: `json` or `pretty` (default: `pretty`)
//! - `RUST_LOG`: log filter (default: `info`)

mod auth;
mod error;
mod handlers;
mod observability;
mod routes;
mod state;

use std::{error::Error, process::ExitCode, sync::Arc};

use profitdash::{
    AccountService, LifecycleScheduler, config::ServiceConfig, security::TokenVerifier,
    store::MemoryStore,
};
use tokio::{net::TcpListener, sync::watch};

use crate::{
    observability::{LogFormat, init_observability},
    state::AppState,
};

#[tokio::main]
async fn main() -> ExitCode {
    init_observability(LogFormat::from_env());

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::from_env()?;

    let verifier = config.auth.verifying_key.as_deref().map(TokenVerifier::from_hex).transpose()?;
    if verifier.is_none() {
        tracing::warn!("auth.verifying_key not set; authenticated routes will answer 401");
    }

    let service = Arc::new(AccountService::from_config(MemoryStore::new(), &config)?);
    let app = routes::router(AppState::new(Arc::clone(&service), verifier), &config.server)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = tokio::spawn(LifecycleScheduler::new(service, &config.scheduler).run(shutdown_rx));

    let listener = TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "profitdash server listening");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown signal received");
        })
        .await;

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("scheduler already stopped");
    }
    if let Err(e) = scheduler.await {
        tracing::error!(error = %e, "scheduler task failed");
    }

    served?;
    tracing::info!("profitdash server stopped");
    Ok(())
}
