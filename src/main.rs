//! gradecastd - grade validation notification broker.
//!
//! Faculty submit grade validations, admins decide, and both sides are
//! told in real time over a WebSocket channel. Decisions for faculty who
//! are offline are held until they next authenticate.

mod config;
mod error;
mod http;
mod metrics;
mod network;
mod state;

use crate::config::{Config, validate};
use crate::http::ApiState;
use crate::network::Gateway;
use crate::state::{Broker, MemoryLedger};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    if let Err(errors) = validate(&config) {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        anyhow::bail!("{} configuration error(s) in {}", errors.len(), config_path);
    }

    info!(
        server = %config.server.name,
        listen = %config.listen.address,
        http = %config.http.address,
        "Starting gradecastd"
    );

    metrics::init();

    let broker = Arc::new(Broker::new(Arc::new(MemoryLedger::new())));

    // Collaborator API + /metrics
    let http_listener = TcpListener::bind(config.http.address).await?;
    let api = ApiState {
        broker: Arc::clone(&broker),
        api_token: config.http.api_token.as_deref().map(Arc::from),
    };
    let http_shutdown = broker.lifecycle.subscribe();
    let http_task = tokio::spawn(http::run_http_server(http_listener, api, http_shutdown));

    let gateway = Gateway::bind(config.listen, config.timeouts, Arc::clone(&broker)).await?;

    // Ctrl-C broadcasts shutdown to the gateway, the HTTP server and every connection.
    {
        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received Ctrl-C, shutting down");
                    broker.lifecycle.shutdown();
                }
                Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
            }
        });
    }

    gateway.run().await?;

    if let Err(e) = http_task.await {
        error!(error = %e, "HTTP server task failed");
    }
    info!("Server stopped");
    Ok(())
}
