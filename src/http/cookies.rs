//! Request cookie parsing.
//!
//! Cookies are parsed once per request into a [`Cookies`] map stored as a
//! request extension, so later stages (CSRF guard, authentication) read a
//! pre-parsed map instead of re-reading headers.

use std::collections::HashMap;

use axum::{
    body::Body,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use cookie::Cookie;

/// Cookies sent with a request, by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookies(HashMap<String, String>);

impl Cookies {
    /// Parse every `Cookie` header. The first occurrence of a name wins and
    /// values are percent-decoded.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let mut cookies = HashMap::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(raw) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse_encoded(raw).filter_map(Result::ok) {
                cookies
                    .entry(cookie.name().to_string())
                    .or_insert_with(|| cookie.value().to_string());
            }
        }
        Self(cookies)
    }

    /// Cookies from the request extension, or parsed from its headers.
    pub fn of(request: &Request<Body>) -> Self {
        request
            .extensions()
            .get::<Cookies>()
            .cloned()
            .unwrap_or_else(|| Self::from_headers(request.headers()))
    }

    /// A cookie value, ignoring empty ones.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Parse request cookies into the [`Cookies`] extension.
pub async fn parse_cookies(mut request: Request<Body>, next: Next) -> Response {
    let cookies = Cookies::from_headers(request.headers());
    request.extensions_mut().insert(cookies);
    next.run(request).await
}
