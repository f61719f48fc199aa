//! Typed events exchanged over the broker channel.
//!
//! Every frame is a single JSON text frame of the form
//! `{"event": "<name>", "data": {...}}` with camelCase field names.
//!
//! ```text
//! client ── authenticate ─────────────▶ server
//! client ◀──────────── authenticated ── server
//! client ── requestSnapshot (admin) ──▶ server
//! client ◀───────────────── snapshot ── server
//! client ◀───── newValidationRequest ── server   (admins group)
//! client ◀─ validationResponseReceived ─ server  (one faculty member)
//! ```

use crate::error::ProtocolError;
use crate::identity::Credentials;
use crate::request::{NewValidationRequest, ValidationRequest, ValidationResponse};
use serde::{Deserialize, Serialize};

/// Events a client sends to the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to an identity.
    Authenticate(Credentials),
    /// Ask for the list of outstanding requests (admins only).
    RequestSnapshot,
}

impl ClientEvent {
    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame.
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Authenticate(_) => "authenticate",
            ClientEvent::RequestSnapshot => "requestSnapshot",
        }
    }
}

/// Events the broker sends to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Reply to `authenticate`.
    Authenticated(AuthOutcome),
    /// Outstanding requests, for resynchronisation.
    Snapshot(Snapshot),
    /// A faculty member submitted grades for validation.
    NewValidationRequest(NewValidationRequest),
    /// An administrator decided one of this faculty member's requests.
    ValidationResponseReceived(ValidationResponse),
    /// Protocol misuse by the client.
    Error(ErrorNotice),
}

impl ServerEvent {
    /// Encode as a text frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a text frame.
    pub fn from_json(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Authenticated(_) => "authenticated",
            ServerEvent::Snapshot(_) => "snapshot",
            ServerEvent::NewValidationRequest(_) => "newValidationRequest",
            ServerEvent::ValidationResponseReceived(_) => "validationResponseReceived",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Successful authentication acknowledgement.
    pub fn auth_ok() -> Self {
        ServerEvent::Authenticated(AuthOutcome {
            success: true,
            error: None,
        })
    }

    /// Failed authentication reply.
    pub fn auth_failed(reason: impl Into<String>) -> Self {
        ServerEvent::Authenticated(AuthOutcome {
            success: false,
            error: Some(reason.into()),
        })
    }

    /// Protocol error notice.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorNotice {
            code,
            message: message.into(),
        })
    }
}

/// Body of `authenticated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOutcome {
    /// Whether the identity was accepted.
    pub success: bool,
    /// Reason for refusal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Requests whose status is still pending, oldest first.
    pub requests: Vec<ValidationRequest>,
}

/// Body of `error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Machine-readable error codes carried by `error` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Frame could not be decoded.
    MalformedFrame,
    /// Event requires an authenticated connection.
    NotAuthenticated,
    /// `authenticate` sent on an already authenticated connection.
    AlreadyAuthenticated,
    /// Role may not issue this event.
    Forbidden,
    /// No `authenticate` arrived within the deadline.
    AuthTimeout,
    /// Connection went silent past the keepalive window.
    IdleTimeout,
}
