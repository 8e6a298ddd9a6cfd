//! Unified error handling for the gateway.
//!
//! Every pipeline stage short-circuits with a [`GatewayError`]; the error
//! renders itself as a JSON response and is never surfaced as a fault.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::AuthError;
use crate::observability::metrics;
use crate::security::csrf::CsrfError;
use crate::security::sanitize::SanitizeError;

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Gateway-level error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Request body, query or params could not be decoded or sanitized.
    #[error("Invalid input data: {0}")]
    InvalidInput(String),

    /// Double-submit check failed.
    #[error(transparent)]
    Csrf(#[from] CsrfError),

    /// Missing or invalid bearer credential.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// No route for the request.
    #[error("Route not found")]
    NotFound,

    /// Controller service unreachable or misbehaving.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Misconfiguration or a bug on our side.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SanitizeError> for GatewayError {
    fn from(e: SanitizeError) -> Self {
        Self::InvalidInput(e.to_string())
    }
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Csrf(_) => StatusCode::FORBIDDEN,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::Csrf(e) => e.reason(),
            Self::Auth(_) => "unauthorized",
            Self::NotFound => "not_found",
            Self::Upstream(_) => "upstream",
            Self::Internal(_) => "internal",
        }
    }

    /// Response body. Internal details are never exposed to clients.
    pub fn body(&self) -> ErrorBody {
        let (message, error) = match self {
            Self::InvalidInput(_) => ("Invalid input data".to_string(), None),
            Self::Csrf(e) => (e.to_string(), Some(e.detail().to_string())),
            Self::Auth(e) => ("Unauthorized".to_string(), Some(e.to_string())),
            Self::NotFound => ("Route not found".to_string(), None),
            Self::Upstream(_) => ("Upstream request failed".to_string(), None),
            Self::Internal(_) => ("Internal server error".to_string(), None),
        };
        ErrorBody { message, error }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Upstream(_) | Self::Internal(_)) {
            tracing::error!(error = %self, "Gateway request error");
        }
        metrics::record_rejection(self.reason());

        (self.status(), Json(self.body())).into_response()
    }
}
