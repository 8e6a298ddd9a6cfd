//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! gateway.toml (optional) + .env / process environment
//!     → loader.rs (parse, apply PORT / CLIENT_URL / JWT_PRIVATE_KEY / UPSTREAM_URL)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{config_from_env, load_config, ConfigError};
pub use schema::{
    AuthConfig, CorsConfig, CsrfConfig, GatewayConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, SameSitePolicy, SanitizerConfig, TimeoutConfig, TlsConfig,
    UpstreamConfig,
};
