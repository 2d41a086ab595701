//! Origin-routed forwarding proxy
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────▶ server (request id, trace, rate limit)
//!                    │
//!                    ▼
//!                 handler ── /version ──▶ static payload
//!                    │
//!                    ├── resolver (Origin/Referer → backend base URL)
//!                    ├── cache (GET 200 responses, TTL + size bound)
//!                    ▼
//!                 forwarder (sanitize headers, timeout) ──────▶ Backend
//!     ◀──────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use origin_proxy::config::{load_config, ObservabilityConfig};
use origin_proxy::observability::{logging, metrics};
use origin_proxy::{HttpServer, Shutdown};

#[derive(Debug, Parser)]
#[command(name = "origin-proxy", version, about = "Origin-routed forwarding proxy")]
struct Cli {
    /// Path to a TOML config file. Environment variables override it.
    #[arg(long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            let _log_guard = logging::init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    // Dropping the guard flushes the file writer; `process::exit` skips drops.
    let log_guard = logging::init_logging(&config.observability);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "origin-proxy starting");
    tracing::info!(
        bind_address = %config.listener.bind_address(),
        request_timeout_secs = config.timeouts.request_secs,
        cache_ttl_secs = config.cache.ttl_secs,
        cache_max_entries = config.cache.max_entries,
        rate_limit = %config.rate_limit.limit,
        log_file = config.observability.log_file.as_deref().unwrap_or("-"),
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

    let bind_address = config.listener.bind_address();
    let listener = match TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_address, error = %e, "Failed to bind listener");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            drop(log_guard);
            std::process::exit(1);
        }
    };

    let shutdown = Shutdown::new();
    shutdown.listen_for_signals();

    if let Err(e) = server.run(listener, shutdown.subscribe()).await {
        tracing::error!(error = %e, "Server error");
        drop(log_guard);
        std::process::exit(1);
    }

    tracing::info!("Shutdown complete");
    drop(log_guard);
}
