//! Dispatch server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum fallback, trace / timeout / request-id layers)
//!                           │
//!                           ▼
//!                     routing::Router ── walks routes by (order, id)
//!                           │   ├─ pattern match + method filter
//!                           │   ├─ handler chain: Next / Handled / Fail
//!                           │   └─ mounted sub-routers (rebased paths)
//!                           ▼
//!     Client Response ◀──── http::response (Dispatch + Reply)
//!
//!     config (TOML) ── watcher ── rebuild Router ── ArcSwap ──▶ live router
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use dispatch_router::config::{load_config, watcher::ConfigWatcher, ServerConfig};
use dispatch_router::http::HttpServer;
use dispatch_router::lifecycle::{signals, Shutdown};
use dispatch_router::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "dispatch-router")]
#[command(about = "Config-driven HTTP route dispatcher", long_about = None)]
struct Args {
    /// Path to the TOML route configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload routes when the config file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability.log_level);
    tracing::info!("dispatch-router v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        routes = config.routes.len(),
        sub_routers = config.routers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // The watcher must outlive the server.
    let (_watcher, config_updates) = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        _ => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_handler(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
