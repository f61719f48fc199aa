//! Client connection management.
//!
//! [`ClientMachine`] holds the connection lifecycle as pure state
//! transitions:
//!
//! ```text
//! Disconnected ─▶ Connecting ─▶ Connected ─▶ Authenticating ─▶ Synced
//!      ▲              │                            │              │
//!      └── reconnect ─┴────────── close ───────────┴──────────────┘
//!                                                  └─ refused ─▶ Rejected
//! ```
//!
//! [`ConnectionManager`] runs it on Tokio with `tokio-tungstenite`.
//!
//! # Example
//!
//! ```
//! use gradecast_proto::client::{ClientAction, ClientMachine, ClientState};
//! use gradecast_proto::{Identity, Role, ServerEvent};
//!
//! let mut machine = ClientMachine::new(Identity::new(Role::Faculty, "F1", "Ms. Reyes"));
//! assert_eq!(machine.start(), vec![ClientAction::Connect]);
//!
//! // Socket opened: the machine asks to send `authenticate`.
//! let actions = machine.on_open();
//! assert!(matches!(actions[0], ClientAction::Send(_)));
//!
//! machine.on_event(ServerEvent::auth_ok());
//! assert_eq!(machine.state(), ClientState::Synced);
//! ```

mod machine;
mod manager;

pub use machine::{ClientAction, ClientMachine, ClientState, DEFAULT_RECONNECT_DELAY};
pub use manager::{ClientConfig, ClientError, ConnectionManager};
