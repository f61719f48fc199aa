//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, ServerConfig, TimeoutsConfig)
//! - [`listen`]: Listener configuration (ListenConfig, HttpConfig)
//! - [`validation`]: Startup checks collecting every problem found

mod listen;
mod types;
mod validation;

pub use listen::{HttpConfig, ListenConfig};
pub use types::{Config, ConfigError, ServerConfig, TimeoutsConfig};
pub use validation::{ValidationError, validate};
