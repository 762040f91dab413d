//! Edge SSR cache server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http server ──▶ entry router ──┬──▶ bypass ──────────────▶ origin
//!                     (request id,                   │
//!                      timeout, limit)               └──▶ CacheHandler (L0)
//!                                                            │
//!                                                            ▼
//!                                                     EdgeTier (L1) ──▶ ObjectTier (L2) ──▶ OriginTier (L3)
//!                                                            │
//!     Client Response                                        ▼
//!     ◀────────────── classify + rewrite headers ◀── tag versions (counter)
//!
//!     Background: cache writes, analytics points, CSR refreshes (drained on shutdown)
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use edge_ssr_cache::config::{load_config, ProxyConfig};
use edge_ssr_cache::lifecycle::{wait_for_shutdown_signal, Shutdown};
use edge_ssr_cache::observability::{logging, metrics};
use edge_ssr_cache::HttpServer;

#[derive(Parser)]
#[command(name = "edge-ssr-cache")]
#[command(about = "Tiered cache in front of a server-side rendering origin", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-ssr-cache starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin_host = %config.origin.host,
        request_timeout_secs = config.timeouts.request_secs,
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

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let trigger = shutdown.trigger_handle();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = trigger.send(());
    });

    let server = HttpServer::new(config)?;
    server.run(listener, receiver).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
