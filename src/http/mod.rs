//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware pipeline)
//!     → request.rs (request ID)
//!     → cookies.rs (parse once per request)
//!     → query.rs (bracket-syntax query/form trees for the sanitizer)
//!     → [security + routing stages]
//!     → forward.rs (controller service round-trip)
//!     → Send to client
//! ```

pub mod cookies;
pub mod forward;
pub mod query;
pub mod request;
pub mod server;

pub use cookies::Cookies;
pub use forward::Upstream;
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use server::{AppState, GatewayServer};
