//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the shared [`AppState`] from configuration
//! - Assemble the middleware pipeline around the API routes
//! - Serve over plain TCP or TLS with graceful shutdown
//!
//! Layer order, outermost first:
//! request id → trace → timeout → concurrency limit → body limit → CORS →
//! cookie parsing → input sanitization → CSRF issuance → routes.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use axum_server::{tls_rustls::RustlsConfig, Handle};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::auth::Authenticator;
use crate::config::{CorsConfig, GatewayConfig};
use crate::error::GatewayError;
use crate::http::cookies::parse_cookies;
use crate::http::forward::Upstream;
use crate::http::request::{request_id, MakeRequestUuidV4, X_REQUEST_ID};
use crate::routing::{api_router, API_PREFIX};
use crate::security::csrf::{issue_csrf_token, CsrfGuard};
use crate::security::input::{sanitize_input, InputGuard};

/// State shared by every stage of the pipeline.
#[derive(Debug, Clone)]
pub struct AppState {
    pub input: Arc<InputGuard>,
    pub csrf: Arc<CsrfGuard>,
    pub auth: Arc<Authenticator>,
    pub upstream: Upstream,
}

impl AppState {
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            input: Arc::new(InputGuard::new(&config.sanitizer)),
            csrf: Arc::new(CsrfGuard::new(config.csrf.clone())?),
            auth: Arc::new(Authenticator::new(&config.auth)),
            upstream: Upstream::new(&config.upstream)?,
        })
    }
}

/// The storefront security gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let state = AppState::new(&config)?;
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let csrf_header = state.csrf.header_name().clone();

        Router::new()
            .route("/", get(banner))
            .route("/health", get(health))
            .nest(API_PREFIX, api_router(state.clone()))
            .fallback(not_found)
            .layer(from_fn_with_state(state.csrf.clone(), issue_csrf_token))
            .layer(from_fn_with_state(state.input.clone(), sanitize_input))
            .layer(from_fn(parse_cookies))
            .layer(cors_layer(&config.cors, csrf_header))
            .layer(RequestBodyLimitLayer::new(config.sanitizer.max_body_bytes))
            .layer(GlobalConcurrencyLimitLayer::new(config.listener.max_connections))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    request_id = %request_id(request.headers()),
                    method = %request.method(),
                    path = %request.uri().path(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
    }

    /// The assembled router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS until `shutdown` fires, then drain for `timeouts.shutdown_secs`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = Handle::new();
        let grace = Duration::from_secs(self.config.timeouts.shutdown_secs);
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("Shutdown signal received, draining connections");
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(app)
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

fn cors_layer(config: &CorsConfig, csrf_header: HeaderName) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(origin = %origin, error = %e, "Ignoring unusable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_LENGTH,
            header::DATE,
            HeaderName::from_static("x-requested-with"),
            HeaderName::from_static("accept-version"),
            HeaderName::from_static("content-md5"),
            HeaderName::from_static("x-api-version"),
            csrf_header.clone(),
        ])
        .expose_headers([csrf_header])
}

async fn banner() -> &'static str {
    "Storefront gateway is running"
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> GatewayError {
    GatewayError::NotFound
}
