//! Phase 2: active connection loop.

use super::{dispatch::dispatch_frame, send_close, send_event};
use crate::error::{CLOSE_GOING_AWAY, CLOSE_IDLE_TIMEOUT, ConnectionError};
use crate::state::{Broker, SessionHandle};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use gradecast_proto::{ErrorCode, ProtocolError, ServerEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Borrowed pieces the loop runs on.
pub(super) struct LoopContext<'a, Si, St> {
    pub sink: &'a mut Si,
    pub stream: &'a mut St,
    pub outgoing: mpsc::UnboundedReceiver<Arc<ServerEvent>>,
    pub session: &'a SessionHandle,
    pub broker: &'a Broker,
    pub shutdown_rx: &'a mut broadcast::Receiver<()>,
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
}

/// Run until the client leaves, goes idle, or the server shuts down.
///
/// Queued events and replies share the one sink; any inbound frame counts as
/// activity and cancels an outstanding ping.
pub(super) async fn run_event_loop<Si, St>(ctx: LoopContext<'_, Si, St>) -> Result<(), ConnectionError>
where
    Si: Sink<Message, Error = WsError> + Unpin,
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let LoopContext {
        sink,
        stream,
        mut outgoing,
        session,
        broker,
        shutdown_rx,
        ping_interval,
        pong_timeout,
    } = ctx;

    let mut last_activity = Instant::now();
    let mut ping_sent: Option<Instant> = None;

    debug!("Entering event loop");

    loop {
        let deadline = match ping_sent {
            Some(at) => at + pong_timeout,
            None => last_activity + ping_interval,
        };

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutdown signal received - disconnecting client");
                send_close(sink, CLOSE_GOING_AWAY, "server shutting down").await;
                return Ok(());
            }

            Some(event) = outgoing.recv() => {
                send_event(sink, &event).await?;
            }

            frame = stream.next() => {
                last_activity = Instant::now();
                ping_sent = None;

                match frame {
                    Some(Ok(Message::Text(text))) => {
                        let reply = dispatch_frame(&text, session, broker).await;
                        send_event(sink, &reply).await?;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let reply = ServerEvent::error(
                            ErrorCode::MalformedFrame,
                            ProtocolError::BinaryFrame.to_string(),
                        );
                        send_event(sink, &reply).await?;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "Client closed connection");
                        return Ok(());
                    }
                    // Pings are answered by the transport.
                    Some(Ok(_)) => {}
                    Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => return Ok(()),
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(()),
                }
            }

            _ = sleep_until(deadline) => {
                if ping_sent.is_some() {
                    warn!(user_id = %session.user_id(), "Connection idle - closing");
                    let notice = ServerEvent::error(ErrorCode::IdleTimeout, "no activity");
                    let _ = send_event(sink, &notice).await;
                    send_close(sink, CLOSE_IDLE_TIMEOUT, "idle timeout").await;
                    return Ok(());
                }
                sink.send(Message::Ping(Vec::new())).await?;
                ping_sent = Some(Instant::now());
            }
        }
    }
}
