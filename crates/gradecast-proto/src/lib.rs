//! # gradecast-proto
//!
//! Shared pieces of the gradecast validation broker.
//!
//! ## Features
//!
//! - Typed wire events exchanged over the broker's WebSocket channel
//! - Identity, validation request and decision payloads
//! - A role-namespaced client notification store with correlation-key merging
//! - Optional Tokio integration: a reconnecting client connection manager
//!
//! ## Quick Start
//!
//! ```rust
//! use gradecast_proto::{ClientEvent, Credentials, ServerEvent};
//!
//! let hello = ClientEvent::Authenticate(Credentials {
//!     role: "faculty".to_string(),
//!     user_id: "F1".to_string(),
//!     display_name: "Ms. Reyes".to_string(),
//! });
//! let frame = hello.to_json().unwrap();
//! assert!(frame.contains("\"event\":\"authenticate\""));
//!
//! let reply = ServerEvent::from_json(r#"{"event":"authenticated","data":{"success":true}}"#).unwrap();
//! assert!(matches!(reply, ServerEvent::Authenticated(ref outcome) if outcome.success));
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod event;
pub mod identity;
mod id;
pub mod request;
pub mod store;

#[cfg(feature = "tokio")]
pub mod client;

#[cfg(feature = "tokio")]
pub use self::client::{ClientConfig, ClientError, ClientState, ConnectionManager};
pub use self::error::ProtocolError;
pub use self::event::{AuthOutcome, ClientEvent, ErrorCode, ErrorNotice, ServerEvent, Snapshot};
pub use self::identity::{Credentials, Identity, IdentityError, Role};
pub use self::request::{
    NewValidationRequest, ValidationDecision, ValidationRequest, ValidationResponse,
    ValidationStatus,
};
pub use self::store::{
    ClientNotification, FileCache, IngestOutcome, MemoryCache, NotificationCache,
    NotificationEvent, NotificationKind, NotificationStore,
};
