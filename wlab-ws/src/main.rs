//! wlab-ws - Weak Supervision Microservice
//!
//! Serves fit/predict, statistics export and source statistics for the
//! labeling platform.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wlab_common::config::{load_toml_config, ConfigOverrides, ServiceConfig};
use wlab_ws::engine::WeightedVoteEngine;
use wlab_ws::services::Notifier;
use wlab_ws::workflow::Orchestrator;
use wlab_ws::AppState;

/// Command-line arguments for wlab-ws
#[derive(Parser, Debug)]
#[command(name = "wlab-ws")]
#[command(about = "Weak supervision microservice for WLAB")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(short, long, env = "WLAB_WS_BIND_ADDR")]
    bind_addr: Option<String>,

    /// SQLite database file
    #[arg(short, long, env = "WLAB_DATABASE_PATH")]
    database_path: Option<PathBuf>,

    /// Directory receiving exported statistics
    #[arg(short, long, env = "WLAB_INFERENCE_DIR")]
    inference_dir: Option<PathBuf>,

    /// Websocket gateway base URL for realtime notifications
    #[arg(long, env = "WS_NOTIFY_ENDPOINT")]
    notify_endpoint: Option<String>,

    /// TOML config file
    #[arg(short, long, env = "WLAB_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wlab_ws=info,wlab_common=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let toml_config = load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(
        ConfigOverrides {
            bind_addr: args.bind_addr,
            database_path: args.database_path,
            inference_dir: args.inference_dir,
            notify_endpoint: args.notify_endpoint,
        },
        toml_config,
    );

    info!("Starting wlab-ws (Weak Supervision) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", config.database_path.display());
    info!("Inference directory: {}", config.inference_dir.display());
    if config.notify_endpoint.is_none() {
        warn!("WS_NOTIFY_ENDPOINT not set, realtime notifications disabled");
    }

    let db_pool = wlab_common::db::init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let notifier = Notifier::new(config.notify_endpoint.clone())?;
    let orchestrator = Orchestrator::new(
        Arc::new(WeightedVoteEngine::default()),
        notifier,
        config.inference_dir.clone(),
    );
    let app = wlab_ws::build_router(AppState::new(db_pool, orchestrator));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);
    info!("Health check: http://{}/healthcheck", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
