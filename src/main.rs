//! Chain proxy service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                     CHAIN PROXY                       │
//!                      │                                                       │
//!   ChainService call  │  ┌──────────┐    ┌──────────┐    ┌────────────────┐   │
//!   ───────────────────┼─▶│ address  │───▶│  caches  │───▶│   node pool    │───┼──▶ alterdotd
//!                      │  │ blocks   │    │ (tip gen)│    │ (failover)     │   │    (JSON-RPC)
//!                      │  └──────────┘    └──────────┘    └────────────────┘   │
//!                      │                        ▲                              │
//!                      │                        │ reset on new height          │
//!   hub listeners      │  ┌──────────┐    ┌──────────┐    ┌────────────────┐   │
//!   ◀──────────────────┼──│   hub    │◀───│  bridge  │◀───│ event sources  │◀──┼─── alterdotd
//!                      │  └──────────┘    └──────────┘    └────────────────┘   │    (ZMQ)
//!                      │                                                       │
//!                      │  supervisor: spawn / connect / respawn / stop          │
//!                      │  admin API, metrics, structured logs                   │
//!                      └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use tokio::net::TcpListener;

use chain_proxy::admin::{self, AdminState};
use chain_proxy::config::load_config;
use chain_proxy::lifecycle::signals::wait_for_signal;
use chain_proxy::observability::{logging, metrics};
use chain_proxy::ChainService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("chain-proxy.toml"));
    let config = load_config(&path)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        network = config.network.name(),
        "chain-proxy starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let admin_config = config.admin.clone();
    let service = ChainService::new(config);

    tokio::select! {
        result = service.start() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Startup failed");
                if let Err(stop_err) = service.stop().await {
                    tracing::warn!(error = %stop_err, "Stop after failed startup reported an error");
                }
                return Err(e.into());
            }
        }
        _ = wait_for_signal() => {
            tracing::info!("Interrupted during startup");
            service.stop().await?;
            return Ok(());
        }
    }

    let admin_task = if admin_config.enabled {
        let listener = TcpListener::bind(&admin_config.bind_address).await?;
        let state = AdminState::new(service.clone(), &admin_config.api_key);
        Some(tokio::spawn(admin::serve(listener, state)))
    } else {
        None
    };

    wait_for_signal().await;
    tracing::info!("Shutting down");

    let stopped = service.stop().await;
    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::warn!(error = %e, "Admin API exited with an error"),
            Err(e) => tracing::warn!(error = %e, "Admin API task failed"),
            Ok(Ok(())) => {}
        }
    }
    stopped?;

    tracing::info!("Shutdown complete");
    Ok(())
}
