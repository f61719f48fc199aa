//! Gateway - WebSocket listener that accepts incoming connections.
//!
//! The Gateway binds the listener and spawns a task per accepted socket that
//! performs the WebSocket upgrade and then runs the Connection.

use crate::config::{ListenConfig, TimeoutsConfig};
use crate::error::AuthError;
use crate::metrics;
use crate::network::Connection;
use crate::state::Broker;
use http::StatusCode;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tracing::{debug, error, info, instrument, warn};

/// How long open connections get to send their close frames on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The Gateway accepts incoming WebSocket connections and spawns handlers.
pub struct Gateway {
    listener: TcpListener,
    allow_origins: Arc<[String]>,
    timeouts: TimeoutsConfig,
    broker: Arc<Broker>,
}

impl Gateway {
    /// Bind the gateway to the configured address.
    pub async fn bind(
        config: ListenConfig,
        timeouts: TimeoutsConfig,
        broker: Arc<Broker>,
    ) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(config.address).await?;
        info!(address = %config.address, "WebSocket listener bound");

        Ok(Self {
            listener,
            allow_origins: config.allow_origins.into(),
            timeouts,
            broker,
        })
    }

    /// Accept connections until the shutdown signal fires, then wait for
    /// open connections to close.
    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> anyhow::Result<()> {
        let mut shutdown_rx = self.broker.lifecycle.subscribe();
        let mut connections = JoinSet::new();

        loop {
            while connections.try_join_next().is_some() {}

            let (stream, addr) = tokio::select! {
                _ = shutdown_rx.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        continue;
                    }
                },
            };

            debug!(%addr, "WebSocket connection attempt");

            let broker = Arc::clone(&self.broker);
            let allowed = Arc::clone(&self.allow_origins);
            let timeouts = self.timeouts.clone();
            connections.spawn(serve_socket(stream, addr, allowed, timeouts, broker));
        }

        info!(open = connections.len(), "Gateway stopping");
        let drain = async { while connections.join_next().await.is_some() {} };
        if tokio::time::timeout(SHUTDOWN_GRACE, drain).await.is_err() {
            warn!("Connections still open after shutdown grace period");
        }
        Ok(())
    }
}

/// Upgrade one accepted socket and run its connection.
///
/// The authentication clock starts here, so a peer that never finishes the
/// upgrade is dropped on the same deadline as one that never authenticates.
async fn serve_socket(
    stream: TcpStream,
    addr: SocketAddr,
    allowed: Arc<[String]>,
    timeouts: TimeoutsConfig,
    broker: Arc<Broker>,
) {
    let deadline = Instant::now() + timeouts.authentication();
    let origin_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        check_origin(&allowed, req, addr)?;
        Ok(response)
    };

    let ws_stream = match timeout_at(deadline, accept_hdr_async(stream, origin_callback)).await {
        Ok(Ok(ws_stream)) => ws_stream,
        Ok(Err(e)) => {
            warn!(%addr, error = %e, "WebSocket handshake failed");
            return;
        }
        Err(_) => {
            warn!(%addr, "WebSocket upgrade not completed before the authentication deadline");
            metrics::record_auth_failure(AuthError::Timeout.error_code());
            return;
        }
    };

    let conn_id = broker.next_conn_id();
    info!(conn = %conn_id, %addr, "WebSocket handshake successful");
    let connection =
        Connection::new(conn_id, addr, ws_stream, broker, timeouts).with_auth_deadline(deadline);
    if let Err(e) = connection.run().await {
        error!(conn = %conn_id, %addr, error = %e, "WebSocket connection error");
    }
    info!(conn = %conn_id, %addr, "WebSocket connection closed");
}

/// Upgrade-time origin check. An empty list, or a `*` entry, allows every
/// origin; otherwise the request must carry a listed `Origin` header.
fn check_origin(allowed: &[String], req: &Request, addr: SocketAddr) -> Result<(), ErrorResponse> {
    if allowed.is_empty() || allowed.iter().any(|a| a == "*") {
        return Ok(());
    }

    let origin = req.headers().get("Origin").and_then(|o| o.to_str().ok());
    if let Some(origin) = origin {
        if allowed.iter().any(|a| a == origin) {
            return Ok(());
        }
        warn!(%addr, %origin, "WebSocket origin rejected");
    } else {
        warn!(%addr, "WebSocket upgrade without Origin rejected");
    }

    let mut response = ErrorResponse::new(Some("origin not allowed".to_string()));
    *response.status_mut() = StatusCode::FORBIDDEN;
    Err(response)
}
