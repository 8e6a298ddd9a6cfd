//! Bearer credential handling.
//!
//! # Data Flow
//! ```text
//! gateway-cli issue-token / controller login
//!     → token.rs (sign HS256 claims with auth.jwt_secret)
//!
//! Protected route:
//!     → middleware.rs (Authorization: Bearer, else `token` cookie)
//!     → token.rs (verify signature and expiry)
//!     → Claims attached to the request
//! ```

pub mod middleware;
pub mod token;

pub use middleware::{require_auth, Authenticator};
pub use token::{AuthError, Claims, TokenSigner, UserDetails};
