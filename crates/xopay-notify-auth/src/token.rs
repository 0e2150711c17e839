//! System token minting and Bearer validation.
//!
//! Internal services authenticate to each other with short-lived JWTs
//! carrying the `system` group. A fresh token is minted for every outgoing
//! HTTP call; the admin surface validates incoming tokens against a set of
//! required access groups.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Claims carried by a system token.
///
/// Matches the shape used across the XOPay services: expiry, the acting
/// user id and the access groups the token grants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemTokenClaims {
    /// Expiration time as Unix timestamp.
    pub exp: i64,

    /// The acting user id (`system` for service-to-service calls).
    pub user_id: String,

    /// Access groups granted by this token.
    pub groups: Vec<String>,
}

impl SystemTokenClaims {
    /// Checks whether the claims grant any of the required groups.
    pub fn allows(&self, access_groups: &[&str]) -> bool {
        self.groups
            .iter()
            .any(|g| access_groups.contains(&g.as_str()))
    }
}

/// Signing configuration for system tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Shared signing key.
    pub key: String,

    /// Signing algorithm name, e.g. "HS512".
    #[serde(default = "default_algorithm")]
    pub algorithm: String,

    /// Token lifetime in minutes.
    #[serde(default = "default_lifetime_minutes")]
    pub token_lifetime_minutes: i64,

    /// User id placed into minted system tokens.
    #[serde(default = "default_system_user_id")]
    pub system_user_id: String,
}

fn default_algorithm() -> String {
    "HS512".to_string()
}

fn default_lifetime_minutes() -> i64 {
    30
}

fn default_system_user_id() -> String {
    "system".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            key: String::new(),
            algorithm: default_algorithm(),
            token_lifetime_minutes: default_lifetime_minutes(),
            system_user_id: default_system_user_id(),
        }
    }
}

/// Mints and validates system tokens.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetime: Duration,
    system_user_id: String,
}

impl std::fmt::Debug for TokenSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSigner")
            .field("algorithm", &self.algorithm)
            .field("lifetime", &self.lifetime)
            .field("system_user_id", &self.system_user_id)
            .finish_non_exhaustive()
    }
}

impl TokenSigner {
    /// Create a signer from settings.
    ///
    /// Only HMAC algorithms are accepted; the services share a symmetric key.
    pub fn new(settings: &AuthSettings) -> AuthResult<Self> {
        let algorithm = match settings.algorithm.as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => return Err(AuthError::UnsupportedAlgorithm(other.to_string())),
        };

        Ok(Self {
            encoding_key: EncodingKey::from_secret(settings.key.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.key.as_bytes()),
            algorithm,
            lifetime: Duration::minutes(settings.token_lifetime_minutes),
            system_user_id: settings.system_user_id.clone(),
        })
    }

    /// Mint a system token for internal service-to-service calls.
    pub fn system_token(&self) -> AuthResult<String> {
        let claims = SystemTokenClaims {
            exp: (Utc::now() + self.lifetime).timestamp(),
            user_id: self.system_user_id.clone(),
            groups: vec!["system".to_string()],
        };

        jsonwebtoken::encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(AuthError::Signing)
    }

    /// Validate a raw token string and return its claims.
    pub fn decode(&self, token: &str) -> AuthResult<SystemTokenClaims> {
        let validation = Validation::new(self.algorithm);

        jsonwebtoken::decode::<SystemTokenClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(err),
            })
    }

    /// Check an `Authorization` header value against the required groups.
    ///
    /// The header must be `Bearer <token>`; the token must verify and carry
    /// at least one of `access_groups`.
    pub fn authorize(
        &self,
        authorization: Option<&str>,
        access_groups: &[&str],
    ) -> AuthResult<SystemTokenClaims> {
        let token = authorization
            .and_then(|header| header.strip_prefix("Bearer "))
            .ok_or(AuthError::TokenNotFound)?;

        let claims = self.decode(token)?;
        if !claims.allows(access_groups) {
            tracing::warn!(
                user_id = %claims.user_id,
                required = ?access_groups,
                "user not allowed to make such request"
            );
            return Err(AuthError::Forbidden);
        }

        Ok(claims)
    }
}
