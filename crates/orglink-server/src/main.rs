//! OrgLink Server — Application entry point.

use std::process::ExitCode;
use std::sync::Arc;

use orglink_core::external::{StaticDirectory, TracingNotifier};
use orglink_db::{DbManager, run_migrations};
use orglink_server::{AppState, ServerConfig, router, spawn_expiry_sweeper};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("orglink=info")),
        )
        .json()
        .init();

    info!("Starting OrgLink server...");

    match run().await {
        Ok(()) => {
            info!("OrgLink server stopped.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "OrgLink server failed");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;

    let db = DbManager::connect(&config.db).await?;
    run_migrations(db.client()).await?;

    let directory = match &config.directory_file {
        Some(path) => StaticDirectory::from_json_file(path)?,
        None => {
            info!("No organization directory configured; accepting every organization id");
            StaticDirectory::open()
        }
    };

    let state = AppState::new(
        db.client().clone(),
        directory,
        Arc::new(TracingNotifier),
        config.relations.clone(),
    );

    let sweeper = config.sweep_interval.map(|every| {
        info!(interval_secs = every.as_secs(), "Expiry sweeper enabled");
        spawn_expiry_sweeper(state.lifecycle.clone(), every)
    });

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "Listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
