//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → input.rs (sanitize body and query)
//!     → csrf.rs (issue token cookie + header)
//!     → [route matched]
//!     → input.rs (sanitize URL params)
//!     → csrf.rs (validate double-submit pair on mutating routes)
//!     → auth (protected routes)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input: nothing downstream sees unsanitized values
//! - Sanitization is a pure transformation, see sanitize.rs

pub mod csrf;
pub mod input;
pub mod sanitize;

pub use csrf::{CsrfError, CsrfGuard, CsrfToken};
pub use input::{InputGuard, SanitizedParams};
pub use sanitize::{SanitizeError, Sanitizer};
