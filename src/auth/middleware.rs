//! Authentication middleware for protected routes.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::token::{AuthError, Claims, TokenSigner};
use crate::config::AuthConfig;
use crate::error::GatewayError;
use crate::http::cookies::Cookies;

/// Locates and verifies the credential of a request.
#[derive(Debug, Clone)]
pub struct Authenticator {
    signer: TokenSigner,
    cookie_name: String,
}

impl Authenticator {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            signer: TokenSigner::new(config),
            cookie_name: config.cookie_name.clone(),
        }
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    /// `Authorization: Bearer` first, then the credential cookie.
    pub fn authenticate(&self, headers: &HeaderMap, cookies: &Cookies) -> Result<Claims, AuthError> {
        let token = bearer_token(headers)
            .or_else(|| cookies.get(&self.cookie_name))
            .ok_or(AuthError::MissingCredential)?;
        self.signer.verify(token)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Reject requests without a valid credential; attach [`Claims`] otherwise.
pub async fn require_auth(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookies = Cookies::of(&request);
    match auth.authenticate(request.headers(), &cookies) {
        Ok(claims) => {
            tracing::debug!(user = %claims.user.object_id, "Authenticated request");
            request.extensions_mut().insert(claims);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Authentication failed");
            GatewayError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserDetails;
    use axum::http::HeaderValue;

    fn authenticator() -> Authenticator {
        Authenticator::new(&AuthConfig {
            jwt_secret: "secret".into(),
            ..AuthConfig::default()
        })
    }

    fn token(auth: &Authenticator) -> String {
        auth.signer()
            .sign(UserDetails {
                object_id: "u1".into(),
                name: "Bob".into(),
                email: "bob@example.com".into(),
                role: "user".into(),
            })
            .unwrap()
    }

    #[test]
    fn test_bearer_header() {
        let auth = authenticator();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token(&auth))).unwrap(),
        );

        let claims = auth.authenticate(&headers, &Cookies::default()).unwrap();
        assert_eq!(claims.user.object_id, "u1");
    }

    #[test]
    fn test_cookie_fallback() {
        let auth = authenticator();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("token={}", token(&auth))).unwrap(),
        );
        let cookies = Cookies::from_headers(&headers);

        assert!(auth.authenticate(&HeaderMap::new(), &cookies).is_ok());
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(
            authenticator().authenticate(&HeaderMap::new(), &Cookies::default()),
            Err(AuthError::MissingCredential)
        );
    }

    #[test]
    fn test_non_bearer_scheme_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcg=="));
        assert_eq!(
            authenticator().authenticate(&headers, &Cookies::default()),
            Err(AuthError::MissingCredential)
        );
    }
}
