//! Phase 1: authentication.

use super::send_event;
use crate::error::AuthError;
use futures_util::{Sink, Stream, StreamExt};
use gradecast_proto::{ClientEvent, ErrorCode, Identity, ProtocolError, ServerEvent};
use tokio::sync::broadcast;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::debug;

/// Handshake exit condition.
#[derive(Debug)]
pub(super) enum HandshakeExit {
    /// Identity refused or deadline passed; the connection must be closed.
    Rejected(AuthError),
    /// Client went away before authenticating.
    Disconnected,
    /// Server is shutting down.
    Shutdown,
}

/// Wait for a valid `authenticate` frame.
///
/// Other events are answered with a `not_authenticated` error and the wait
/// continues. The deadline is taken when the TCP connection was accepted and
/// is never extended.
pub(super) async fn run_handshake<Si, St>(
    sink: &mut Si,
    stream: &mut St,
    deadline: Instant,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<Identity, HandshakeExit>
where
    Si: Sink<Message, Error = WsError> + Unpin,
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        let frame = tokio::select! {
            _ = sleep_until(deadline) => {
                return Err(HandshakeExit::Rejected(AuthError::Timeout));
            }
            _ = shutdown.recv() => return Err(HandshakeExit::Shutdown),
            frame = stream.next() => frame,
        };

        let reply = match frame {
            Some(Ok(Message::Text(text))) => match ClientEvent::from_json(&text) {
                Ok(ClientEvent::Authenticate(credentials)) => {
                    return credentials
                        .validate()
                        .map_err(|e| HandshakeExit::Rejected(e.into()));
                }
                Ok(other) => ServerEvent::error(
                    ErrorCode::NotAuthenticated,
                    format!("{} requires authentication", other.name()),
                ),
                Err(e) => ServerEvent::error(ErrorCode::MalformedFrame, e.to_string()),
            },
            Some(Ok(Message::Binary(_))) => {
                ServerEvent::error(ErrorCode::MalformedFrame, ProtocolError::BinaryFrame.to_string())
            }
            Some(Ok(Message::Close(_))) | None => {
                debug!("Client disconnected during handshake");
                return Err(HandshakeExit::Disconnected);
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(error = %e, "Read error during handshake");
                return Err(HandshakeExit::Disconnected);
            }
        };

        if send_event(sink, &reply).await.is_err() {
            return Err(HandshakeExit::Disconnected);
        }
    }
}
