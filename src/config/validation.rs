//! Configuration validation.
//!
//! Validates configuration at startup to catch common errors early.

use super::Config;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("server.name is required")]
    MissingServerName,
    #[error("timeouts.authentication must be greater than zero")]
    ZeroAuthenticationTimeout,
    #[error("timeouts.ping must be greater than zero")]
    ZeroPingInterval,
    #[error("listen.address and http.address must differ (both {0})")]
    AddressConflict(std::net::SocketAddr),
    #[error("http.api_token must not be blank when set")]
    BlankApiToken,
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.name.trim().is_empty() {
        errors.push(ValidationError::MissingServerName);
    }

    if config.timeouts.authentication == 0 {
        errors.push(ValidationError::ZeroAuthenticationTimeout);
    }
    if config.timeouts.ping == 0 {
        errors.push(ValidationError::ZeroPingInterval);
    }

    if config.listen.address == config.http.address {
        errors.push(ValidationError::AddressConflict(config.listen.address));
    }

    if let Some(token) = &config.http.api_token
        && token.trim().is_empty()
    {
        errors.push(ValidationError::BlankApiToken);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
