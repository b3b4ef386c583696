//! forma-server - form responses and live analytics over HTTP
//!
//! Startup order: read the TOML config (if any), initialize tracing, log the
//! build identification line, resolve settings, open the database, serve.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use forma_common::config::{self, CliOverrides, ServerSettings, TomlConfig};
use forma_server::{build_router, db, AppState};
use tokio::signal;
use tracing::{error, info, warn};

/// Command-line arguments for forma-server
#[derive(Parser, Debug)]
#[command(name = "forma-server")]
#[command(about = "Form responses and live analytics service")]
#[command(version)]
struct Args {
    /// Folder holding forma.db
    #[arg(short, long, env = "FORMA_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "FORMA_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "FORMA_PORT")]
    port: Option<u16>,

    /// Seconds a long-poll is held before the timeout reply
    #[arg(long, env = "FORMA_LONGPOLL_TIMEOUT_SECS")]
    longpoll_timeout_secs: Option<u64>,

    /// Explicit config file (default: platform config dir)
    #[arg(short, long, env = "FORMA_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before tracing exists; its outcome is logged below
    let config_path = args.config.clone().or_else(config::find_config_file);
    let loaded = config_path.as_deref().map(TomlConfig::from_path);

    let default_level = loaded
        .as_ref()
        .and_then(|r| r.as_ref().ok())
        .and_then(|c| c.log_level.clone())
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting forma-server v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let toml_config = match (config_path, loaded) {
        (Some(path), Some(Ok(config))) => {
            info!("Loaded config from {}", path.display());
            config
        }
        (Some(path), Some(Err(e))) => {
            warn!("Ignoring config {}: {}", path.display(), e);
            TomlConfig::default()
        }
        _ => {
            info!("No config file found, using defaults");
            TomlConfig::default()
        }
    };

    let cli = CliOverrides {
        data_folder: args.data_folder,
        host: args.host,
        port: args.port,
        longpoll_timeout_secs: args.longpoll_timeout_secs,
    };
    let settings = ServerSettings::resolve(&cli, &toml_config);
    settings
        .ensure_data_folder()
        .context("Failed to create data folder")?;

    let db_path = settings.database_path();
    info!("Database path: {}", db_path.display());

    let pool = match db::init_database(&db_path).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Failed to open database: {}", e);
            return Err(e).context("Database initialization failed");
        }
    };

    let state = AppState::new(pool, settings.longpoll_timeout);
    let app = build_router(state);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("forma-server listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);
    info!("Long-poll hold time: {:?}", settings.longpoll_timeout);

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
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
