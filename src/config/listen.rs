//! Listener configuration.

use serde::Deserialize;
use std::net::SocketAddr;

/// WebSocket listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:8088").
    pub address: SocketAddr,
    /// Allowed `Origin` header values; empty allows any origin.
    #[serde(default)]
    pub allow_origins: Vec<String>,
}

/// Internal HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Address to bind to (e.g., "127.0.0.1:8089").
    pub address: SocketAddr,
    /// Shared bearer token required on `/internal/*` when set.
    #[serde(default)]
    pub api_token: Option<String>,
}
