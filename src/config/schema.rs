//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files, and
//! every section has defaults so an empty file is a working configuration.

use serde::{Deserialize, Serialize};

use crate::security::sanitize::{CREDENTIAL_KEYS, DOCUMENT_STORE_OPERATORS};

/// Root configuration for the storefront gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Controller service that accepted requests are forwarded to.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Cross-origin settings for the storefront client.
    pub cors: CorsConfig,

    /// Anti-forgery token settings.
    pub csrf: CsrfConfig,

    /// Input sanitization settings.
    pub sanitizer: SanitizerConfig,

    /// Bearer credential settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum requests processed concurrently (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Controller service location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the controller service (plain http).
    pub url: String,

    /// Path prefix the controller service mounts its API under.
    pub path_prefix: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:3000".to_string(),
            path_prefix: "/api/v1".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Grace period for in-flight requests on shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Storefront origin; a trailing slash is ignored.
    pub client_url: Option<String>,

    /// Additional allowed origins.
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            client_url: None,
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl CorsConfig {
    /// Every allowed origin, client URL first.
    pub fn origins(&self) -> Vec<String> {
        self.client_url
            .iter()
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .chain(self.allowed_origins.iter().cloned())
            .collect()
    }
}

/// `SameSite` attribute for the anti-forgery cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSitePolicy {
    None,
    Lax,
    Strict,
}

/// Anti-forgery token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Cookie holding the token.
    pub cookie_name: String,

    /// Request/response header mirroring the token.
    pub header_name: String,

    /// Random bytes per token (hex doubles the length).
    pub token_bytes: usize,

    /// Cookie lifetime in seconds.
    pub max_age_secs: u64,

    /// Restrict the cookie to HTTPS.
    pub secure: bool,

    /// Cross-site policy. `none` lets a storefront on another origin send it.
    pub same_site: SameSitePolicy,

    /// Cookie path.
    pub path: String,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            cookie_name: "csrf-token".to_string(),
            header_name: "X-CSRF-Token".to_string(),
            token_bytes: 32,
            max_age_secs: 24 * 60 * 60,
            secure: true,
            same_site: SameSitePolicy::None,
            path: "/".to_string(),
        }
    }
}

/// Input sanitization configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SanitizerConfig {
    /// Keys starting with this prefix are query operators.
    pub operator_prefix: String,

    /// Operator names of the backing document store.
    pub operator_denylist: Vec<String>,

    /// Keys whose values are never markup-escaped (credentials).
    pub preserved_keys: Vec<String>,

    /// Deepest accepted nesting of an input tree.
    pub max_depth: usize,

    /// Largest accepted request body in bytes.
    pub max_body_bytes: usize,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            operator_prefix: "$".to_string(),
            operator_denylist: DOCUMENT_STORE_OPERATORS
                .iter()
                .map(|op| op.to_string())
                .collect(),
            preserved_keys: CREDENTIAL_KEYS.iter().map(|key| key.to_string()).collect(),
            max_depth: 64,
            max_body_bytes: 1000 * 1024,
        }
    }
}

/// Bearer credential configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret used to sign and verify credentials.
    pub jwt_secret: String,

    /// Credential lifetime in seconds.
    pub token_ttl_secs: u64,

    /// Cookie checked when no `Authorization` header is sent.
    pub cookie_name: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Set JWT_PRIVATE_KEY in production.
            jwt_secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            token_ttl_secs: 24 * 60 * 60,
            cookie_name: "token".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or machine-parsable logs.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
