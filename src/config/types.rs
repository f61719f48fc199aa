//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::listen::{HttpConfig, ListenConfig};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Broker configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// WebSocket listener for client connections.
    pub listen: ListenConfig,
    /// Internal HTTP API used by the CRUD layer, plus `/metrics`.
    pub http: HttpConfig,
    /// Authentication and keepalive windows.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name used in logs.
    pub name: String,
}

/// Connection timeouts, in seconds.
///
/// A connection has `authentication` seconds to send a valid `authenticate`.
/// Once active, a WebSocket ping goes out after `ping` seconds of silence and
/// the connection is closed if nothing arrives within `pong` more seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutsConfig {
    #[serde(default = "default_authentication_timeout")]
    pub authentication: u64,
    #[serde(default = "default_ping_interval")]
    pub ping: u64,
    #[serde(default = "default_pong_timeout")]
    pub pong: u64,
}

impl TimeoutsConfig {
    pub fn authentication(&self) -> Duration {
        Duration::from_secs(self.authentication)
    }

    pub fn ping(&self) -> Duration {
        Duration::from_secs(self.ping)
    }

    pub fn pong(&self) -> Duration {
        Duration::from_secs(self.pong)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            authentication: default_authentication_timeout(),
            ping: default_ping_interval(),
            pong: default_pong_timeout(),
        }
    }
}

fn default_authentication_timeout() -> u64 {
    10
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_default_when_section_missing() {
        let config: Config = toml::from_str(
            r#"
[server]
name = "gradecast"

[listen]
address = "127.0.0.1:8088"

[http]
address = "127.0.0.1:8089"
"#,
        )
        .unwrap();
        assert_eq!(config.timeouts.authentication(), Duration::from_secs(10));
        assert_eq!(config.timeouts.ping, 30);
        assert_eq!(config.timeouts.pong, 20);
        assert!(config.listen.allow_origins.is_empty());
        assert!(config.http.api_token.is_none());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/nonexistent/gradecast.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn load_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nname = 42\n").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }
}
