//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (ports, timeouts, body limits)
//! - Reject origin settings the forwarding client cannot honour
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::ProxyConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("origin.host must not be empty")]
    EmptyOriginHost,

    #[error("origin.protocol '{0}' is not supported, expected 'http' or 'https'")]
    OriginProtocol(String),

    #[error("origin.port must be greater than zero")]
    OriginPort,

    #[error("origin.max_body_bytes must be greater than zero")]
    MaxBodyBytes,

    #[error("timeouts.request_secs must be greater than zero")]
    RequestTimeout,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("cache.object_key_prefix '{0}' must be empty or start with '/'")]
    ObjectKeyPrefix(String),
}

/// Validate a parsed configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    if config.origin.host.trim().is_empty() {
        errors.push(ValidationError::EmptyOriginHost);
    }
    if !matches!(config.origin.protocol.as_str(), "http" | "https") {
        errors.push(ValidationError::OriginProtocol(config.origin.protocol.clone()));
    }
    if config.origin.port == 0 {
        errors.push(ValidationError::OriginPort);
    }
    if config.origin.max_body_bytes == 0 {
        errors.push(ValidationError::MaxBodyBytes);
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::RequestTimeout);
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let prefix = &config.cache.object_key_prefix;
    if !prefix.is_empty() && !prefix.starts_with('/') {
        errors.push(ValidationError::ObjectKeyPrefix(prefix.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
