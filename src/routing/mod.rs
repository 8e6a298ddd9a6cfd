//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! table.rs (static RouteSpec list: method, path template, auth, csrf)
//!     → router.rs (one axum route per table entry, guards layered per route)
//!     → http::forward (path template filled with sanitized params)
//! ```
//!
//! # Design Decisions
//! - The route table is the single source of truth for which routes mutate
//!   state; CSRF validation is derived from it, never configured ad hoc
//! - Routes are compiled once at startup and immutable at runtime
//! - Within a route, CSRF validation runs before authentication

pub mod router;
pub mod table;

pub use router::api_router;
pub use table::{PathSegment, RouteMethod, RouteSpec, API_PREFIX, API_ROUTES};
