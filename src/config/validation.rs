//! Configuration validation.
//!
//! Serde handles syntax; this module checks that values make sense together.
//! All problems are collected so an operator sees every mistake at once.

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;
use url::Url;

use crate::config::schema::GatewayConfig;

/// Minimum entropy for an anti-forgery token, in bytes.
const MIN_TOKEN_BYTES: usize = 16;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::new("listener.max_connections", "must be > 0"));
    }

    match Url::parse(&config.upstream.url) {
        Ok(url) if url.scheme() == "http" && url.host_str().is_some() => {}
        Ok(_) => errors.push(ValidationError::new(
            "upstream.url",
            "must be an http:// URL with a host",
        )),
        Err(e) => errors.push(ValidationError::new("upstream.url", e.to_string())),
    }
    if !config.upstream.path_prefix.is_empty() && !config.upstream.path_prefix.starts_with('/') {
        errors.push(ValidationError::new("upstream.path_prefix", "must start with '/'"));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be > 0"));
    }

    if config.csrf.cookie_name.is_empty() {
        errors.push(ValidationError::new("csrf.cookie_name", "must not be empty"));
    }
    if HeaderName::from_bytes(config.csrf.header_name.as_bytes()).is_err() {
        errors.push(ValidationError::new(
            "csrf.header_name",
            format!("'{}' is not a valid header name", config.csrf.header_name),
        ));
    }
    if config.csrf.token_bytes < MIN_TOKEN_BYTES {
        errors.push(ValidationError::new(
            "csrf.token_bytes",
            format!("must be at least {MIN_TOKEN_BYTES}"),
        ));
    }

    if config.sanitizer.max_depth == 0 {
        errors.push(ValidationError::new("sanitizer.max_depth", "must be > 0"));
    }
    if config.sanitizer.max_body_bytes == 0 {
        errors.push(ValidationError::new("sanitizer.max_body_bytes", "must be > 0"));
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::new("auth.jwt_secret", "must not be empty"));
    }
    if config.auth.token_ttl_secs == 0 {
        errors.push(ValidationError::new("auth.token_ttl_secs", "must be > 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            "is not a socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".to_string();
        config.upstream.url = "https://controllers:3000".to_string();
        config.csrf.header_name = "bad header".to_string();
        config.auth.jwt_secret.clear();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "upstream.url",
                "csrf.header_name",
                "auth.jwt_secret"
            ]
        );
    }

    #[test]
    fn test_short_tokens_rejected() {
        let mut config = GatewayConfig::default();
        config.csrf.token_bytes = 8;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].to_string(), "csrf.token_bytes: must be at least 16");
    }
}
