//! xmlrpcd - XML-RPC endpoint
//!
//! Serves the sample library service over HTTP with a method overview page.

mod services;

use services::Library;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use xmlrpc_core::Registry;
use xmlrpc_server::{Config, Metrics, Server, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration (from file if XMLRPC_CONFIG is set, then env overrides)
    let config_path = std::env::var("XMLRPC_CONFIG").ok();
    let config = match Config::load() {
        Ok(c) => {
            if let Some(ref path) = config_path {
                tracing::info!("Loaded config from {}", path);
            }
            c
        }
        Err(e) => {
            // If a config file was explicitly specified, fail on error
            if config_path.is_some() {
                tracing::error!("Failed to load config: {}", e);
                return Err(e.into());
            }
            // Otherwise fall back to defaults
            tracing::warn!("Invalid environment configuration ({}), using defaults", e);
            Config::default()
        }
    };

    let registry = Arc::new(Registry::builder().service(Library::new()).build()?);

    tracing::info!("Starting xmlrpcd");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!("  Endpoint: {}", config.rpc.path);
    tracing::info!("  Max body size: {} bytes", config.rpc.max_body_bytes);
    tracing::info!(
        "  Overview page: {}",
        if config.overview.enabled { "enabled" } else { "disabled" }
    );

    let mut server_config = ServerConfig::from_config(&config);
    if config.metrics.enabled {
        server_config = server_config.with_metrics(Arc::new(Metrics::new()?));
        tracing::info!("  Metrics: enabled at /metrics");
    } else {
        tracing::info!("  Metrics: disabled");
    }

    let server = Arc::new(Server::new(server_config, registry));

    // Spawn shutdown signal handler
    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Run server (blocks until shutdown)
    server.run().await?;

    tracing::info!("Server stopped");
    Ok(())
}
