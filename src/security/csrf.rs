//! Double-submit cookie CSRF protection.
//!
//! Issuance runs on every request: a client without a token cookie receives
//! a fresh random token as a script-readable cookie, and every response
//! mirrors the active token in the `X-CSRF-Token` header. Validation runs on
//! state-changing routes only and requires the header to equal the cookie.
//!
//! An existing token is reused until the cookie expires on the client; it is
//! not rotated per request. Validation never alters the token lifecycle.

use std::fmt;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use cookie::{Cookie, SameSite};
use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;
use thiserror::Error;

use crate::config::{CsrfConfig, SameSitePolicy};
use crate::error::GatewayError;
use crate::http::cookies::Cookies;
use crate::observability::metrics;

/// An anti-forgery token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CsrfToken(String);

impl CsrfToken {
    /// `bytes` random bytes from the OS generator, lowercase hex encoded.
    pub fn generate(bytes: usize) -> Self {
        let mut buf = vec![0u8; bytes];
        OsRng.fill_bytes(&mut buf);
        Self(hex::encode(buf))
    }

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for CsrfToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CsrfToken").field(&"***").finish()
    }
}

/// Why a state-changing request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CsrfError {
    #[error("CSRF token missing from cookie")]
    CookieMissing,

    #[error("CSRF token missing from header")]
    HeaderMissing,

    #[error("CSRF token mismatch")]
    Mismatch,
}

impl CsrfError {
    /// Client-facing explanation sent next to the message.
    pub fn detail(&self) -> &'static str {
        match self {
            Self::CookieMissing => "CSRF protection: Token cookie not found",
            Self::HeaderMissing => {
                "CSRF protection: Please include X-CSRF-Token header in your request"
            }
            Self::Mismatch => "CSRF protection: Token validation failed. Tokens do not match.",
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::CookieMissing => "csrf_cookie_missing",
            Self::HeaderMissing => "csrf_header_missing",
            Self::Mismatch => "csrf_mismatch",
        }
    }
}

/// Outcome of token issuance for one request.
#[derive(Debug, Clone)]
pub struct Issued {
    pub token: CsrfToken,
    /// Cookie to set when the token is new.
    pub set_cookie: Option<Cookie<'static>>,
}

/// Issues and validates tokens according to [`CsrfConfig`].
#[derive(Debug, Clone)]
pub struct CsrfGuard {
    config: CsrfConfig,
    header_name: HeaderName,
}

impl CsrfGuard {
    pub fn new(config: CsrfConfig) -> Result<Self, GatewayError> {
        let header_name = HeaderName::from_bytes(config.header_name.as_bytes())
            .map_err(|e| GatewayError::Internal(format!("invalid CSRF header name: {e}")))?;
        Ok(Self {
            config,
            header_name,
        })
    }

    pub fn header_name(&self) -> &HeaderName {
        &self.header_name
    }

    /// Reuse the cookie token when present, otherwise mint a new one.
    ///
    /// A cookie whose value cannot travel in a header (control characters
    /// after percent-decoding) is treated as absent and replaced.
    pub fn issue(&self, cookies: &Cookies) -> Issued {
        if let Some(existing) = cookies.get(&self.config.cookie_name) {
            if HeaderValue::from_str(existing).is_ok() {
                return Issued {
                    token: CsrfToken::new(existing),
                    set_cookie: None,
                };
            }
            // Cannot be mirrored in the response header, so it is replaced.
            tracing::debug!(
                cookie = %self.config.cookie_name,
                "Replacing CSRF cookie that is not a valid header value"
            );
        }

        let token = CsrfToken::generate(self.config.token_bytes);
        let set_cookie = self.build_cookie(&token);
        Issued {
            token,
            set_cookie: Some(set_cookie),
        }
    }

    fn build_cookie(&self, token: &CsrfToken) -> Cookie<'static> {
        let same_site = match self.config.same_site {
            SameSitePolicy::None => SameSite::None,
            SameSitePolicy::Lax => SameSite::Lax,
            SameSitePolicy::Strict => SameSite::Strict,
        };
        let max_age = i64::try_from(self.config.max_age_secs).unwrap_or(i64::MAX);

        Cookie::build((self.config.cookie_name.clone(), token.as_str().to_owned()))
            .path(self.config.path.clone())
            .http_only(false)
            .secure(self.config.secure)
            .same_site(same_site)
            .max_age(cookie::time::Duration::seconds(max_age))
            .build()
    }

    /// Check the double-submit pair. Read-only methods always pass.
    pub fn validate(
        &self,
        method: &Method,
        cookies: &Cookies,
        headers: &HeaderMap,
    ) -> Result<(), CsrfError> {
        if is_read_only(method) {
            return Ok(());
        }

        let from_cookie = cookies
            .get(&self.config.cookie_name)
            .ok_or(CsrfError::CookieMissing)?;

        let from_header = headers
            .get(&self.header_name)
            .map(HeaderValue::as_bytes)
            .filter(|value| !value.is_empty())
            .ok_or(CsrfError::HeaderMissing)?;

        if bool::from(from_cookie.as_bytes().ct_eq(from_header)) {
            Ok(())
        } else {
            Err(CsrfError::Mismatch)
        }
    }
}

/// Methods that never change server state.
pub fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Make sure every client holds a token and every response carries it.
pub async fn issue_csrf_token(
    State(guard): State<Arc<CsrfGuard>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let issued = guard.issue(&Cookies::of(&request));
    if issued.set_cookie.is_some() {
        tracing::debug!(path = %request.uri().path(), "Issued new CSRF token");
        metrics::record_csrf_issued();
    }
    request.extensions_mut().insert(issued.token.clone());

    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(issued.token.as_str()) {
        response.headers_mut().insert(guard.header_name().clone(), value);
    }
    if let Some(cookie) = issued.set_cookie {
        match HeaderValue::from_str(&cookie.to_string()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode CSRF cookie"),
        }
    }

    response
}

/// Reject state-changing requests whose header token does not match the cookie.
pub async fn validate_csrf_token(
    State(guard): State<Arc<CsrfGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let cookies = Cookies::of(&request);
    match guard.validate(request.method(), &cookies, request.headers()) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            tracing::warn!(
                method = %request.method(),
                path = %request.uri().path(),
                reason = e.reason(),
                "CSRF validation failed"
            );
            GatewayError::from(e).into_response()
        }
    }
}
