//! Connection - Handles an individual client connection.
//!
//! Each Connection runs in its own Tokio task:
//!
//! ```text
//! Phase 1: Handshake (authenticate within the deadline)
//!    ↓ register with the Broker, drain pending notifications
//! Phase 2: Event loop (tokio::select!)
//!    ┌──────────────────────────────────────────────┐
//!    │  shutdown ──▶ close 1001                     │
//!    │  outgoing queue ──▶ sink                     │
//!    │  stream ──▶ dispatch ──▶ sink                │
//!    │  keepalive deadline ──▶ ping / close 4003    │
//!    └──────────────────────────────────────────────┘
//!    ↓
//! Phase 3: Unregister (skipped if a newer connection took over)
//! ```

mod dispatch;
mod event_loop;
mod handshake;

use event_loop::{LoopContext, run_event_loop};
use handshake::{HandshakeExit, run_handshake};

use crate::config::TimeoutsConfig;
use crate::error::{CLOSE_GOING_AWAY, ConnectionError};
use crate::metrics;
use crate::state::{Broker, ConnId, SessionHandle};
use futures_util::{Sink, SinkExt, StreamExt};
use gradecast_proto::ServerEvent;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, instrument, warn};

/// A client connection handler.
pub struct Connection<S> {
    conn_id: ConnId,
    addr: SocketAddr,
    ws: WebSocketStream<S>,
    broker: Arc<Broker>,
    timeouts: TimeoutsConfig,
    auth_deadline: Instant,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(
        conn_id: ConnId,
        addr: SocketAddr,
        ws: WebSocketStream<S>,
        broker: Arc<Broker>,
        timeouts: TimeoutsConfig,
    ) -> Self {
        let auth_deadline = Instant::now() + timeouts.authentication();
        Self {
            conn_id,
            addr,
            ws,
            broker,
            timeouts,
            auth_deadline,
        }
    }

    /// Authentication deadline, when the clock started before the upgrade.
    pub fn with_auth_deadline(mut self, deadline: Instant) -> Self {
        self.auth_deadline = deadline;
        self
    }

    /// Run the connection to completion.
    #[instrument(skip(self), fields(conn = %self.conn_id, addr = %self.addr), name = "connection")]
    pub async fn run(self) -> Result<(), ConnectionError> {
        metrics::connection_opened();
        let _open = OpenConnection;

        let Self {
            conn_id,
            ws,
            broker,
            timeouts,
            auth_deadline,
            ..
        } = self;
        let mut shutdown_rx = broker.lifecycle.subscribe();
        let (mut sink, mut stream) = ws.split();

        // Phase 1
        let identity = match run_handshake(
            &mut sink,
            &mut stream,
            auth_deadline,
            &mut shutdown_rx,
        )
        .await
        {
            Ok(identity) => identity,
            Err(HandshakeExit::Rejected(err)) => {
                warn!(reason = err.error_code(), error = %err, "Authentication failed");
                metrics::record_auth_failure(err.error_code());
                let _ = send_event(&mut sink, &err.reply()).await;
                send_close(&mut sink, err.close_code(), &err.to_string()).await;
                return Ok(());
            }
            Err(HandshakeExit::Shutdown) => {
                send_close(&mut sink, CLOSE_GOING_AWAY, "server shutting down").await;
                return Ok(());
            }
            Err(HandshakeExit::Disconnected) => return Ok(()),
        };

        // Activation: the ack is queued before registration so it precedes
        // anything drained from the pending store.
        let (tx, outgoing) = mpsc::unbounded_channel();
        let session = SessionHandle::new(conn_id, identity, tx);
        let _ = session.send(Arc::new(ServerEvent::auth_ok()));

        let registration = broker.register(session.clone());
        info!(
            user_id = %session.user_id(),
            role = session.identity.role.as_str(),
            drained = registration.drained,
            "Authenticated"
        );

        if session.identity.is_admin() {
            let snapshot = broker.snapshot().await;
            let _ = session.send(Arc::new(ServerEvent::Snapshot(snapshot)));
        }

        // Phase 2
        let result = run_event_loop(LoopContext {
            sink: &mut sink,
            stream: &mut stream,
            outgoing,
            session: &session,
            broker: &broker,
            shutdown_rx: &mut shutdown_rx,
            ping_interval: timeouts.ping(),
            pong_timeout: timeouts.pong(),
        })
        .await;

        // Phase 3
        if !broker.disconnect(&session) {
            debug!(user_id = %session.user_id(), "Superseded session ended");
        }

        result
    }
}

/// Decrements the open-connection gauge however `run` exits.
struct OpenConnection;

impl Drop for OpenConnection {
    fn drop(&mut self) {
        metrics::connection_closed();
    }
}

async fn send_event<Si>(sink: &mut Si, event: &ServerEvent) -> Result<(), ConnectionError>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    let text = event.to_json()?;
    sink.send(Message::Text(text)).await?;
    Ok(())
}

/// Best effort: the peer may already be gone.
async fn send_close<Si>(sink: &mut Si, code: u16, reason: &str)
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    };
    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Close frame not sent");
    }
}
