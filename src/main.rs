//! peercache node binary
//!
//! Runs one cluster node: a demo-backed cache group plus the peer-facing RPC
//! server.

use std::collections::HashMap;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use peercache::{CacheError, CacheServer, Config, Group, Loader, Result};

/// Main entry point for a peercache node.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the demo cache group backed by the slow-DB loader
/// 4. Create the RPC server and seed the peer ring
/// 5. Register the server as the group's peer picker
/// 6. Serve until SIGINT/SIGTERM, then stop gracefully
#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env filter
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "peercache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting peercache node");

    let config = Config::from_env();
    info!(
        "Configuration loaded: self_addr={}, peers={:?}, cache_bytes={}, cache_kind={:?}",
        config.self_addr, config.peer_addrs, config.cache_bytes, config.cache_kind
    );

    let group = Group::new(
        "scores",
        config.cache_bytes,
        config.cache_kind,
        slow_db_loader(),
    );

    let server = match CacheServer::new(config.self_addr.clone()) {
        Ok(server) => server,
        Err(err) => {
            eprintln!("failed to create server: {err}");
            std::process::exit(1);
        }
    };
    server.set(&config.peer_addrs);
    group.register_peers(server.clone());
    info!("peercache is running at {}", config.self_addr);

    let runner = {
        let server = server.clone();
        tokio::spawn(async move { server.start().await })
    };

    shutdown_signal().await;
    server.stop();

    match runner.await {
        Ok(Ok(())) => info!("Server shutdown complete"),
        Ok(Err(err)) => warn!("server exited with error: {err}"),
        Err(err) => warn!("server task aborted: {err}"),
    }
}

/// The demo data source: a fixed score table with a log line per lookup.
fn slow_db_loader() -> impl Loader + 'static {
    let db: HashMap<&'static str, &'static str> =
        HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);
    move |key: &str| -> Result<Vec<u8>> {
        info!("[SlowDB] search key {key}");
        db.get(key)
            .map(|value| value.as_bytes().to_vec())
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
