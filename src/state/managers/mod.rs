//! Domain managers for broker state.
//!
//! Each manager owns one piece of state. The registry and the pending store
//! are only ever touched together, under the broker's directory lock.

pub mod lifecycle;
pub mod pending;
pub mod registry;
