//! State management module.
//!
//! Contains the Broker (shared routing state) and the managers it owns.

mod broker;
mod conn_id;
pub mod ledger;
pub mod managers;

pub use broker::{Broker, Registration};
pub use conn_id::{ConnId, ConnIdGenerator};
pub use ledger::{MemoryLedger, RequestLedger};
pub use managers::registry::SessionHandle;
