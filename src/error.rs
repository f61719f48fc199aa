//! Unified error handling for gradecast.
//!
//! Connection-level failures carry the `error` event code and WebSocket
//! close code they map to, plus a static label for metrics.

use gradecast_proto::{ErrorCode, IdentityError, ServerEvent};
use serde::Serialize;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

// ============================================================================
// Authentication Errors
// ============================================================================

/// Close code sent after a refused `authenticate`.
pub const CLOSE_AUTH_FAILED: u16 = 4001;
/// Close code sent when no `authenticate` arrived in time.
pub const CLOSE_AUTH_TIMEOUT: u16 = 4002;
/// Close code sent when an active connection stops answering pings.
pub const CLOSE_IDLE_TIMEOUT: u16 = 4003;
/// Close code sent on server shutdown (RFC 6455 "going away").
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Reasons a connection fails to become active.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("invalid role: {0:?}")]
    InvalidRole(String),

    #[error("missing user id")]
    MissingUserId,

    #[error("authentication timed out")]
    Timeout,

    #[error("already authenticated")]
    AlreadyAuthenticated,
}

impl AuthError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidRole(_) => "invalid_role",
            Self::MissingUserId => "missing_user_id",
            Self::Timeout => "timeout",
            Self::AlreadyAuthenticated => "already_authenticated",
        }
    }

    /// WebSocket close code for a connection ending with this error.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Timeout => CLOSE_AUTH_TIMEOUT,
            _ => CLOSE_AUTH_FAILED,
        }
    }

    /// Frame sent to the client before closing. Refused identities get
    /// `authenticated {success: false}`; protocol misuse gets `error`.
    pub fn reply(&self) -> ServerEvent {
        match self {
            Self::InvalidRole(_) | Self::MissingUserId => ServerEvent::auth_failed(self.to_string()),
            Self::Timeout => ServerEvent::error(ErrorCode::AuthTimeout, self.to_string()),
            Self::AlreadyAuthenticated => {
                ServerEvent::error(ErrorCode::AlreadyAuthenticated, self.to_string())
            }
        }
    }
}

impl From<IdentityError> for AuthError {
    fn from(e: IdentityError) -> Self {
        match e {
            IdentityError::InvalidRole(role) => Self::InvalidRole(role),
            IdentityError::MissingUserId => Self::MissingUserId,
        }
    }
}

// ============================================================================
// Delivery outcomes
// ============================================================================

/// Where a directed notification ended up. A miss is an outcome, not an
/// error: the sender is never told the recipient was unreachable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    /// Handed to the recipient's live connection.
    Direct,
    /// Stored until the recipient next authenticates.
    Queued,
    /// No recipient could be named; dropped.
    Missed,
}

/// Errors from the collaborator-facing broker operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("decision status must be approved or rejected, got {0}")]
    InvalidDecisionStatus(gradecast_proto::ValidationStatus),
}

// ============================================================================
// Connection Errors
// ============================================================================

/// Transport failures that end a connection task.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to encode event: {0}")]
    Encode(#[from] gradecast_proto::ProtocolError),
}
