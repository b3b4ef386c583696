//! forma-watch - follow a form's analytics from the terminal
//!
//! Long-polls forma-server and prints a summary every time new responses
//! arrive. Stops on Ctrl+C or when the form does not exist.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use forma_common::config::DEFAULT_LONGPOLL_TIMEOUT_SECS;
use forma_server::analytics::FormAnalytics;
use forma_server::client::LiveClient;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Command-line arguments for forma-watch
#[derive(Parser, Debug)]
#[command(name = "forma-watch")]
#[command(about = "Print live analytics for a form")]
#[command(version)]
struct Args {
    /// Form to watch
    form_id: String,

    /// Server base URL
    #[arg(short, long, default_value = "http://127.0.0.1:5790", env = "FORMA_SERVER_URL")]
    server: String,

    /// Start after this watermark (epoch ms); 0 prints the current state first
    #[arg(long, default_value_t = 0)]
    since_ms: i64,

    /// Server long-poll hold time in seconds
    #[arg(long, default_value_t = DEFAULT_LONGPOLL_TIMEOUT_SECS, env = "FORMA_LONGPOLL_TIMEOUT_SECS")]
    hold_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!(
        "forma-watch v{} [{}] watching form {} on {}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        args.form_id,
        args.server
    );

    let client = LiveClient::new(&args.server, Duration::from_secs(args.hold_secs))
        .context("Failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        on_ctrl_c.cancel();
    });

    let cursor = client
        .watch(&args.form_id, args.since_ms, &cancel, print_snapshot)
        .await
        .with_context(|| format!("Stopped watching form {}", args.form_id))?;

    info!("Stopped at watermark {}", cursor);
    Ok(())
}

fn print_snapshot(snapshot: &FormAnalytics) {
    let at = snapshot
        .last_response_ms
        .and_then(forma_common::time::ms_to_datetime)
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "-".to_string());

    println!(
        "== {} · {} responses · last {}",
        snapshot.form_id, snapshot.response_count, at
    );
    for field in &snapshot.per_field {
        println!("  {} ({})", field.label, field.summary);
        for bar in &field.bars {
            println!("    {:<12} {}", bar.label, bar.value);
        }
    }
}
