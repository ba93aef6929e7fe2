mod bridge;
mod config;
mod engine;
mod notifier;
mod push;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info};

use focuslog_api_client::ApiClient;
use focuslog_core::civil;
use focuslog_local_db::LocalDb;

use notifier::OutboxNotifier;

#[derive(Parser, Debug)]
#[command(name = "focuslog-tracker", about = "focuslog background tracker daemon")]
struct Args {
    /// Config file path (default: ~/.config/focuslog/tracker.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the browser events bridge file
    #[arg(long)]
    bridge_file: Option<PathBuf>,

    /// Run a single sync cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("focuslog_tracker=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("Tracker fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();
    info!("focuslog-tracker starting");

    let cfg = config::load_config(args.config.as_ref())?;

    let db = Arc::new(LocalDb::open()?);
    info!("Local DB opened");

    // Startup retention sweep; record-time pruning takes over from here.
    db.prune(civil::civil_date(Utc::now().timestamp_millis()))?;

    let api = ApiClient::new(&cfg.server.url, Duration::from_secs(30))?;

    if args.once {
        push::sync_once(&cfg, &db, &api).await?;
        return Ok(());
    }

    let events_file = args
        .bridge_file
        .unwrap_or_else(|| config::expand_path(&cfg.bridge.events_file));
    info!("Bridge events file: {}", events_file.display());

    let notifier = Arc::new(OutboxNotifier::new(config::expand_path(
        &cfg.bridge.outbox_file,
    )));

    // Channel for tracker events
    let (tx, rx) = mpsc::unbounded_channel();

    // Shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let bridge_handle = tokio::spawn(bridge::run_bridge(
        events_file,
        tx,
        shutdown_rx.clone(),
    ));

    let engine_handle = tokio::spawn(engine::run_engine(
        cfg.clone(),
        Arc::clone(&db),
        rx,
        shutdown_rx.clone(),
        notifier,
    ));

    let sync_handle = tokio::spawn(push::run_sync_loop(
        cfg.clone(),
        Arc::clone(&db),
        api,
        shutdown_rx,
    ));

    wait_for_shutdown().await;

    info!("Shutdown signal received, stopping...");
    let _ = shutdown_tx.send(true);

    let _ = bridge_handle.await;
    let _ = engine_handle.await;
    let _ = sync_handle.await;

    info!("focuslog-tracker stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("Failed to register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to register Ctrl+C handler");
        info!("Received Ctrl+C");
    }
}
