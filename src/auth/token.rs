//! Signing and verification of bearer credentials.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AuthConfig;

/// Errors raised while signing or checking a credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("No bearer credential provided")]
    MissingCredential,

    #[error("Credential expired")]
    Expired,

    #[error("Invalid credential")]
    Invalid,

    #[error("Failed to sign credential: {0}")]
    Signing(String),
}

/// Identity carried by a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDetails {
    pub object_id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Verified credential payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub user: UserDetails,
    pub iat: u64,
    pub exp: u64,
}

/// HS256 signer/verifier.
#[derive(Clone)]
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: u64,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.as_bytes();
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs: config.token_ttl_secs,
        }
    }

    /// Sign a credential valid for the configured lifetime.
    pub fn sign(&self, user: UserDetails) -> Result<String, AuthError> {
        let iat = now_secs();
        self.sign_claims(&Claims {
            user,
            iat,
            exp: iat + self.ttl_secs,
        })
    }

    fn sign_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Check signature and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid,
            })
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(&AuthConfig {
            jwt_secret: secret.to_string(),
            ..AuthConfig::default()
        })
    }

    fn alice() -> UserDetails {
        UserDetails {
            object_id: "65f0c0ffee".into(),
            name: "Alice".into(),
            email: "alice@example.com".into(),
            role: "admin".into(),
        }
    }

    #[test]
    fn test_sign_then_verify() {
        let signer = signer("secret");
        let token = signer.sign(alice()).unwrap();
        let claims = signer.verify(&token).unwrap();

        assert_eq!(claims.user, alice());
        assert_eq!(claims.exp - claims.iat, 86_400);
    }

    #[test]
    fn test_claims_use_camel_case() {
        let value = serde_json::to_value(Claims {
            user: alice(),
            iat: 1,
            exp: 2,
        })
        .unwrap();
        assert_eq!(value["objectId"], "65f0c0ffee");
        assert_eq!(value["exp"], 2);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = signer("secret").sign(alice()).unwrap();
        assert_eq!(signer("other").verify(&token), Err(AuthError::Invalid));
    }

    #[test]
    fn test_expired_rejected() {
        let signer = signer("secret");
        let token = signer
            .sign_claims(&Claims {
                user: alice(),
                iat: 1_000,
                exp: 2_000,
            })
            .unwrap();
        assert_eq!(signer.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_garbage_rejected() {
        assert_eq!(signer("secret").verify("not.a.jwt"), Err(AuthError::Invalid));
    }
}
