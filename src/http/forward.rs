//! Forwarding of accepted requests to the controller service.

use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri},
    response::{IntoResponse, Response},
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::GatewayError;
use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::{PathSegment, RouteSpec};
use crate::security::input::SanitizedParams;

/// Headers that describe a single connection and are never forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// HTTP client bound to the controller service.
#[derive(Clone)]
pub struct Upstream {
    client: Client<HttpConnector, Body>,
    base: Url,
    prefix: String,
}

impl std::fmt::Debug for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Upstream")
            .field("base", &self.base.as_str())
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl Upstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, GatewayError> {
        let base = Url::parse(&config.url)
            .map_err(|e| GatewayError::Internal(format!("invalid upstream URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(GatewayError::Internal(format!(
                "upstream URL cannot carry a path: {}",
                config.url
            )));
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Ok(Self {
            client,
            base,
            prefix: config.path_prefix.clone(),
        })
    }

    /// Upstream URI for a route, its sanitized params and query.
    pub fn target(
        &self,
        spec: &RouteSpec,
        params: &SanitizedParams,
        query: Option<&str>,
    ) -> Result<Uri, GatewayError> {
        let mut url = self.base.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| GatewayError::Internal("upstream URL cannot carry a path".into()))?;
            segments.clear();
            segments.extend(self.prefix.split('/').filter(|s| !s.is_empty()));

            for segment in spec.segments() {
                match segment {
                    PathSegment::Literal(literal) => {
                        segments.push(literal);
                    }
                    PathSegment::Param(name) => {
                        let value = params.get(name).ok_or_else(|| {
                            GatewayError::InvalidInput(format!("parameter {name} was removed"))
                        })?;
                        segments.push(&value);
                    }
                }
            }
        }
        url.set_query(query.filter(|q| !q.is_empty()));

        url.as_str()
            .parse()
            .map_err(|e| GatewayError::Internal(format!("unrepresentable upstream URI: {e}")))
    }

    async fn send(&self, request: Request<Body>) -> Result<Response, GatewayError> {
        let response: hyper::Response<hyper::body::Incoming> = self
            .client
            .request(request)
            .await
            .map_err(|e| GatewayError::Upstream(e.to_string()))?;

        let (mut parts, body) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(body)))
    }
}

/// Forward a request that passed every guard of its route.
pub async fn forward(state: AppState, spec: &'static RouteSpec, request: Request<Body>) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let id = request_id(request.headers()).to_string();

    let params = request
        .extensions()
        .get::<SanitizedParams>()
        .cloned()
        .unwrap_or_default();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());

    let target = match state.upstream.target(spec, &params, request.uri().query()) {
        Ok(uri) => uri,
        Err(e) => return e.into_response(),
    };

    tracing::debug!(
        request_id = %id,
        route = spec.name,
        method = %method,
        target = %target,
        "Forwarding request"
    );

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    if let Some(ip) = peer {
        append_forwarded_for(&mut headers, &ip.to_string());
    }

    let mut upstream_request = Request::new(body);
    *upstream_request.method_mut() = method.clone();
    *upstream_request.uri_mut() = target;
    *upstream_request.headers_mut() = headers;

    match state.upstream.send(upstream_request).await {
        Ok(response) => {
            metrics::record_request(method.as_str(), response.status().as_u16(), spec.name, start);
            response
        }
        Err(e) => {
            tracing::warn!(request_id = %id, route = spec.name, error = %e, "Upstream request failed");
            metrics::record_request(method.as_str(), e.status().as_u16(), spec.name, start);
            e.into_response()
        }
    }
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Headers named by `Connection` are connection-scoped too.
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in named.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn append_forwarded_for(headers: &mut HeaderMap, ip: &str) {
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) if !existing.is_empty() => format!("{existing}, {ip}"),
        _ => ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
