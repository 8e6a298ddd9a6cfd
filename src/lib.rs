//! Storefront security gateway.
//!
//! Sits in front of the storefront controller service and makes sure nothing
//! reaches it unsanitized or forged:
//!
//! - every string in the body, query and URL parameters is stripped of
//!   markup and HTML-escaped, and document-store operator keys are dropped
//! - every client holds a double-submit CSRF token, and every
//!   state-changing route requires the header copy to match the cookie
//! - protected routes require a signed bearer credential
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http::server (request id, trace, limits, CORS, cookies)
//!                  ──▶ security::input (body + query)
//!                  ──▶ security::csrf (issue)
//!                  ──▶ routing (API route table)
//!                        ──▶ security::input (params)
//!                        ──▶ security::csrf (validate)
//!                        ──▶ auth
//!                        ──▶ http::forward ──▶ controller service
//! ```

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Request guards
pub mod auth;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
