//! Client events on an active connection.

use crate::error::AuthError;
use crate::state::{Broker, SessionHandle};
use gradecast_proto::{ClientEvent, ErrorCode, ServerEvent};
use tracing::debug;

/// Decode one text frame and produce the reply.
pub(super) async fn dispatch_frame(text: &str, session: &SessionHandle, broker: &Broker) -> ServerEvent {
    let event = match ClientEvent::from_json(text) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "Malformed frame");
            return ServerEvent::error(ErrorCode::MalformedFrame, e.to_string());
        }
    };

    debug!(event = event.name(), "Client event");
    match event {
        ClientEvent::RequestSnapshot if session.identity.is_admin() => {
            ServerEvent::Snapshot(broker.snapshot().await)
        }
        ClientEvent::RequestSnapshot => ServerEvent::error(
            ErrorCode::Forbidden,
            "requestSnapshot is only available to admins",
        ),
        ClientEvent::Authenticate(_) => AuthError::AlreadyAuthenticated.reply(),
    }
}
