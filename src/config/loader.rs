//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
///
/// Environment overrides are applied before validation.
pub fn load_config(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    load_config_str(&content)
}

/// Parse, override and validate configuration held in memory.
pub fn load_config_str(content: &str) -> Result<GatewayConfig, ConfigError> {
    let mut config: GatewayConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Build a validated configuration from defaults plus environment.
pub fn config_from_env() -> Result<GatewayConfig, ConfigError> {
    load_config_str("")
}

/// Apply deployment overrides.
///
/// - `PORT` replaces the port of `listener.bind_address`
/// - `CLIENT_URL` sets `cors.client_url`
/// - `JWT_PRIVATE_KEY` sets `auth.jwt_secret`
/// - `UPSTREAM_URL` sets `upstream.url`
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(port) = lookup("PORT").filter(|p| !p.is_empty()) {
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{host}:{port}");
    }

    if let Some(client_url) = lookup("CLIENT_URL").filter(|u| !u.is_empty()) {
        config.cors.client_url = Some(client_url);
    }

    if let Some(secret) = lookup("JWT_PRIVATE_KEY").filter(|s| !s.is_empty()) {
        config.auth.jwt_secret = secret;
    }

    if let Some(url) = lookup("UPSTREAM_URL").filter(|u| !u.is_empty()) {
        config.upstream.url = url;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_example_config_parses() {
        let config: GatewayConfig =
            toml::from_str(include_str!("../../gateway.example.toml")).unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert_eq!(config.csrf.cookie_name, "csrf-token");
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [csrf]
            same_site = "lax"
            "#,
        )
        .unwrap();
        assert_eq!(config.csrf.same_site, crate::config::SameSitePolicy::Lax);
        assert_eq!(config.csrf.token_bytes, 32);
        assert_eq!(config.upstream.path_prefix, "/api/v1");
    }

    #[test]
    fn test_invalid_config_reports_validation() {
        let mut config: GatewayConfig = toml::from_str(
            r#"
            [csrf]
            token_bytes = 4
            "#,
        )
        .unwrap();
        apply_env_overrides(&mut config, |_| None);
        let errors = validate_config(&config).unwrap_err();
        let err = ConfigError::Validation(errors);
        assert!(err.to_string().starts_with("Validation failed: "));
        assert!(err.to_string().contains("token_bytes"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "9443"),
            ("CLIENT_URL", "https://shop.example.com/"),
            ("JWT_PRIVATE_KEY", "s3cret"),
            ("UPSTREAM_URL", "http://controllers:4000"),
        ]
        .into_iter()
        .collect();

        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.listener.bind_address, "0.0.0.0:9443");
        assert_eq!(config.cors.origins()[0], "https://shop.example.com");
        assert_eq!(config.auth.jwt_secret, "s3cret");
        assert_eq!(config.upstream.url, "http://controllers:4000");
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let mut config = GatewayConfig::default();
        apply_env_overrides(&mut config, |_| Some(String::new()));
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.cors.client_url.is_none());
    }
}
