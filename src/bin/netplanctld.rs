//! netplan configuration daemon (netplanctld)
//!
//! Serves the HTTP API that edits netplan documents and applies them.
//!
//! # Usage
//!
//! ```bash
//! # Start with the packaged configuration (requires root to write /etc/netplan)
//! sudo netplanctld
//!
//! # Alternate config file and listener
//! sudo netplanctld --config ./netplanctl.toml --bind 127.0.0.1:9000
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use libnetplanctl::{router, AppState, NetplanService, NetplanctlConfig};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_CONFIG: &str = "/etc/netplanctl/netplanctl.toml";

/// netplan configuration daemon
#[derive(Parser, Debug)]
#[command(name = "netplanctld")]
#[command(version)]
#[command(about = "HTTP API for netplan network configuration", long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Listen address, overrides the configured bind/port (e.g. 0.0.0.0:8080)
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("Starting netplanctld v{}", env!("CARGO_PKG_VERSION"));

    #[cfg(target_os = "linux")]
    {
        let uid = unsafe { libc::getuid() };
        if uid != 0 {
            warn!("Not running as root - writing netplan documents and applying them may fail");
        }
    }

    let config = load_config(args.config.as_deref())?;
    info!("Ethernet document: {}", config.documents.ethernet.display());
    info!("Wi-Fi document:    {}", config.documents.wifi.display());
    info!("Bridge document:   {}", config.documents.bridge.display());

    let addr = match args.bind {
        Some(addr) => addr,
        None => format!("{}:{}", config.server.bind, config.server.port)
            .parse()
            .with_context(|| {
                format!("Invalid listen address {}:{}", config.server.bind, config.server.port)
            })?,
    };

    let state = AppState::new(NetplanService::from_config(&config));
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("netplanctld stopped");
    Ok(())
}

/// Explicit `--config` must exist; the packaged default is optional
fn load_config(path: Option<&Path>) -> Result<NetplanctlConfig> {
    let mut config = match path {
        Some(path) => NetplanctlConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None if Path::new(DEFAULT_CONFIG).exists() => NetplanctlConfig::load(DEFAULT_CONFIG)
            .with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))?,
        None => {
            info!("No configuration file, using defaults");
            NetplanctlConfig::default()
        }
    };

    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    Ok(config)
}

/// Initialize logging based on command-line arguments
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "netplanctld={},libnetplanctl={},tower_http={}",
            args.log_level, args.log_level, args.log_level
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Resolves on SIGTERM or Ctrl+C
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to register SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C), initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
