//! Consumption Prediction Control Server
//!
//! Serves the control API for the plugin's web frontend.
//!
//! Usage:
//!   consumption-ctl-server
//!   consumption-ctl-server --data-dir /tmp/plugin --bind 0.0.0.0:8787
//!   consumption-ctl-server --config /etc/consumption-ctl/control.json -vv

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use consumption_core::{ControlApi, ControlSettings, LogCatalog, MarkerLayer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use consumption_ctl::{router, AppState};

/// Consumption Prediction Control Server
#[derive(Parser, Debug)]
#[command(name = "consumption-ctl-server")]
#[command(about = "HTTP control surface for the consumption prediction plugin")]
struct Args {
    /// Control settings file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Plugin data directory (logs, settings, database, manifest)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Address to listen on (default: 127.0.0.1:8787)
    #[arg(short, long)]
    bind: Option<String>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings =
        ControlSettings::load(args.config.as_deref()).context("Failed to load control settings")?;
    if let Some(dir) = args.data_dir {
        settings = settings.with_data_dir(dir);
    }
    if let Some(bind) = args.bind {
        settings.bind = bind;
    }

    setup_logging(args.verbose, &settings.log_dir);

    let app = router(AppState::new(ControlApi::from_settings(&settings)));

    let listener = tokio::net::TcpListener::bind(&settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    tracing::info!(
        addr = %settings.bind,
        log_dir = %settings.log_dir.display(),
        "Control server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Control server stopped");
    Ok(())
}

/// Console logging plus the control log in the plugin's log directory.
///
/// Falls back to console-only logging when the control log cannot be opened.
fn setup_logging(verbosity: u8, log_dir: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbosity {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });

    let catalog = LogCatalog::plugin();
    let layer = catalog
        .control_file()
        .map(|file| MarkerLayer::new(log_dir, file));

    match layer {
        Some(Ok(marker_layer)) => {
            tracing_subscriber::registry()
                .with(marker_layer)
                .with(tracing_subscriber::fmt::layer().with_target(false))
                .with(filter)
                .init();
        }
        Some(Err(e)) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
            tracing::warn!(log_dir = %log_dir.display(), "Failed to open control log: {}", e);
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(false)
                .init();
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
    }
}
