//! Resilient payment router.
//!
//! Submits native and token transfers through a pool of redundant RPC
//! endpoints, with failover, nonce-conflict rotation and bounded retries.
//!
//! # Architecture Overview
//!
//! ```text
//!     HTTP request
//!         │
//!         ▼
//!   ┌──────────┐    ┌────────────┐    ┌─────────────┐
//!   │   http   │───▶│  payments  │───▶│load_balancer│──▶ RPC endpoints
//!   │  server  │    │ dispatcher │    │ pool+cursor │
//!   └──────────┘    │retry loop  │    └─────────────┘
//!         ▲         └─────┬──────┘
//!         │               ▼
//!   ┌──────────┐    ┌────────────┐
//!   │ history  │    │ blockchain │  fees, gas, signing, inclusion
//!   └──────────┘    └────────────┘
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use payment_router::blockchain::SigningIdentity;
use payment_router::config::{load_config, RouterConfig};
use payment_router::lifecycle::{signals, startup, Shutdown};
use payment_router::observability::{logging, metrics};
use payment_router::HttpServer;

#[derive(Parser)]
#[command(name = "payment-router")]
#[command(about = "Payment router with RPC failover", long_about = None)]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let (config, missing) = if args.config.exists() {
        (load_config(&args.config)?, false)
    } else {
        (RouterConfig::default(), true)
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("payment-router v{} starting", env!("CARGO_PKG_VERSION"));
    if missing {
        tracing::warn!(path = %args.config.display(), "Config file not found, using defaults");
    }

    tracing::info!(
        bind_address = %config.server.bind_address,
        endpoints = config.blockchain.rpc_urls.len(),
        chain_id = config.blockchain.chain_id,
        "Configuration loaded"
    );

    let identity = SigningIdentity::from_env(config.blockchain.chain_id)?;
    let state = startup::build_state(&config, identity).await?;

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    let server = HttpServer::new(config.server.clone(), state);
    server.run(listener, shutdown.wait()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
