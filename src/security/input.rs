//! Input sanitization middleware.
//!
//! Applies [`Sanitizer::clean`] to the three input containers of a request
//! and writes the results back in place, so nothing downstream sees raw input:
//!
//! - body: JSON and urlencoded bodies are decoded, cleaned and re-encoded
//!   (other content types, such as multipart uploads, pass through)
//! - query: decoded as a tree, cleaned, and re-encoded into the URI
//! - params: cleaned after routing and stored as [`SanitizedParams`]
//!
//! Any failure answers `400 {"message":"Invalid input data"}`.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, RawPathParams, State},
    http::{header, uri::PathAndQuery, HeaderMap, HeaderValue, Request, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};

use crate::config::SanitizerConfig;
use crate::error::GatewayError;
use crate::http::query;
use crate::security::sanitize::Sanitizer;

/// Sanitizer plus the body size it is willing to buffer.
#[derive(Debug, Clone)]
pub struct InputGuard {
    sanitizer: Sanitizer,
    max_body_bytes: usize,
}

impl InputGuard {
    pub fn new(config: &SanitizerConfig) -> Self {
        Self {
            sanitizer: Sanitizer::new(config),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// Clean the body and query of a request.
    pub async fn clean_request(&self, request: Request<Body>) -> Result<Request<Body>, GatewayError> {
        let (mut parts, body) = request.into_parts();

        if let Some(raw) = parts.uri.query().filter(|q| !q.is_empty()) {
            let cleaned = self.sanitizer.clean(decode_tree(raw)?)?;
            parts.uri = replace_query(&parts.uri, &query::encode(&cleaned))?;
        }

        let body = match BodyKind::of(&parts.headers) {
            BodyKind::Passthrough => body,
            kind => {
                let bytes = axum::body::to_bytes(body, self.max_body_bytes)
                    .await
                    .map_err(|e| GatewayError::InvalidInput(format!("unreadable body: {e}")))?;
                if bytes.is_empty() {
                    Body::empty()
                } else {
                    let cleaned = self.clean_body(kind, &bytes)?;
                    set_content_length(&mut parts.headers, cleaned.len());
                    Body::from(cleaned)
                }
            }
        };

        Ok(Request::from_parts(parts, body))
    }

    fn clean_body(&self, kind: BodyKind, bytes: &Bytes) -> Result<Bytes, GatewayError> {
        match kind {
            BodyKind::Json => {
                let value: Value = serde_json::from_slice(bytes)
                    .map_err(|e| GatewayError::InvalidInput(format!("malformed JSON: {e}")))?;
                let cleaned = self.sanitizer.clean(value)?;
                serde_json::to_vec(&cleaned)
                    .map(Bytes::from)
                    .map_err(|e| GatewayError::InvalidInput(e.to_string()))
            }
            BodyKind::Form => {
                let raw = std::str::from_utf8(bytes)
                    .map_err(|e| GatewayError::InvalidInput(format!("malformed form: {e}")))?;
                let cleaned = self.sanitizer.clean(decode_tree(raw)?)?;
                Ok(Bytes::from(query::encode(&cleaned)))
            }
            BodyKind::Passthrough => Ok(bytes.clone()),
        }
    }

    /// Clean matched URL parameters.
    pub fn clean_params<'a, I>(&self, params: I) -> Result<SanitizedParams, GatewayError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let raw: Map<String, Value> = params
            .into_iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect();

        match self.sanitizer.clean(Value::Object(raw))? {
            Value::Object(map) => Ok(SanitizedParams(map)),
            _ => Ok(SanitizedParams::default()),
        }
    }
}

/// URL parameters after sanitization, keyed by placeholder name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SanitizedParams(pub Map<String, Value>);

impl SanitizedParams {
    /// A parameter as text. Parameters dropped as operators are absent.
    pub fn get(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyKind {
    Json,
    Form,
    Passthrough,
}

impl BodyKind {
    fn of(headers: &HeaderMap) -> Self {
        let Some(content_type) = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        else {
            return Self::Passthrough;
        };

        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        if essence == "application/json" || essence.ends_with("+json") {
            Self::Json
        } else if essence == "application/x-www-form-urlencoded" {
            Self::Form
        } else {
            Self::Passthrough
        }
    }
}

fn decode_tree(raw: &str) -> Result<Value, GatewayError> {
    query::decode(raw).map_err(|e| GatewayError::InvalidInput(e.to_string()))
}

fn replace_query(uri: &Uri, query: &str) -> Result<Uri, GatewayError> {
    let path_and_query = if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    };

    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(
        PathAndQuery::try_from(path_and_query)
            .map_err(|e| GatewayError::InvalidInput(format!("unencodable query: {e}")))?,
    );
    Uri::from_parts(parts).map_err(|e| GatewayError::InvalidInput(e.to_string()))
}

fn set_content_length(headers: &mut HeaderMap, len: usize) {
    headers.remove(header::TRANSFER_ENCODING);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

/// Clean body and query before anything else reads them.
pub async fn sanitize_input(
    State(guard): State<Arc<InputGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    match guard.clean_request(request).await {
        Ok(request) => next.run(request).await,
        Err(e) => {
            tracing::warn!(method = %method, path = %path, error = %e, "Rejected request input");
            e.into_response()
        }
    }
}

/// Clean the URL parameters matched by the route.
pub async fn sanitize_params(
    State(guard): State<Arc<InputGuard>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();

    let cleaned = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => guard.clean_params(raw.iter()),
        Err(_) => Ok(SanitizedParams::default()),
    };

    match cleaned {
        Ok(params) => {
            parts.extensions.insert(params);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Rejected URL parameters");
            e.into_response()
        }
    }
}
