//! Audio Player (rcmp-ap) - Main entry point
//!
//! Loads configuration and the catalog, brings up the render engine (libmpv,
//! or degraded without it), and serves the remote-control API until Ctrl+C or
//! SIGTERM.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use rcmp_ap::api::{self, AppContext};
use rcmp_ap::config::{Config, ConfigOverrides};
use rcmp_ap::library::Library;
use rcmp_ap::playback::{MpvBackend, PlaybackSession, RenderEngine};
use rcmp_common::config::LoggingConfig;
use rcmp_common::NotificationChannel;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for rcmp-ap
#[derive(Parser, Debug)]
#[command(name = "rcmp-ap")]
#[command(about = "Remote-controlled music player")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "RCMP_PORT")]
    port: Option<u16>,

    /// Root folder containing music files
    #[arg(short, long, env = "RCMP_MUSIC_DIR")]
    music_dir: Option<PathBuf>,

    /// Catalog document (relative path -> tags)
    #[arg(long, env = "RCMP_CATALOG_FILE")]
    catalog_file: Option<PathBuf>,

    /// Only play tracks carrying one of these tags (repeatable)
    #[arg(short, long = "tag")]
    tags: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        port: args.port,
        music_dir: args.music_dir,
        catalog_file: args.catalog_file,
        tags: args.tags,
    };
    let config = Config::load(args.config.as_deref(), overrides)
        .context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!("Starting rcmp Audio Player v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration: {}", config.summary());

    let library = Arc::new(
        Library::open(config.music_dir.clone(), config.catalog_file.clone())
            .await
            .with_context(|| {
                format!(
                    "Failed to open catalog {} (fix or move the file to rebuild it)",
                    config.catalog_file.display()
                )
            })?,
    );

    let engine = match MpvBackend::load(&config.libmpv_paths) {
        Ok(backend) => RenderEngine::new(Arc::new(backend), config.poll_interval),
        Err(e) => {
            warn!("{}", e);
            RenderEngine::degraded()
        }
    };
    let engine = Arc::new(engine);

    let notifications = NotificationChannel::new();
    let session = Arc::new(PlaybackSession::new(
        Arc::clone(&engine),
        Arc::clone(&library),
        notifications.clone(),
        config.tag_filter.clone(),
        config.volume,
    ));

    let listener = session.spawn_track_end_listener();
    engine
        .start()
        .context("Failed to start render engine poll loop")?;

    let ctx = AppContext::new(Arc::clone(&session), Arc::clone(&library), notifications);

    let served = api::run(ctx, &config.bind_address, config.port, shutdown_signal()).await;

    info!("Shutting down");
    if let Err(e) = session.stop().await {
        warn!("Failed to stop playback: {}", e);
    }
    engine.shutdown();
    listener.abort();

    match library.persist_if_dirty().await {
        Ok(true) => info!("Catalog saved"),
        Ok(false) => {}
        Err(e) => error!("Failed to save catalog: {}", e),
    }

    served.context("HTTP server failed")?;
    info!("Shutdown complete");
    Ok(())
}

/// Install the global subscriber
///
/// `RUST_LOG` wins; otherwise the configured level applies to this service's
/// crates and to request tracing.
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        format!("rcmp_ap={level},rcmp_common={level},tower_http={level}").into()
    });

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
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
            Ok(mut stream) => {
                stream.recv().await;
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
