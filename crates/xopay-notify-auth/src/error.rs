//! Authentication error types.

/// Errors that can occur while minting or validating tokens.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The configured signing algorithm is not supported.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The token could not be signed.
    #[error("Token signing failed: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),

    /// The Authorization header is missing or not a Bearer token.
    #[error("Token not found")]
    TokenNotFound,

    /// The token signature or structure is invalid.
    #[error("Wrong token: {0}")]
    InvalidToken(#[source] jsonwebtoken::errors::Error),

    /// The token has expired.
    #[error("Token expired")]
    TokenExpired,

    /// The token is valid but its groups do not grant access.
    #[error("Request forbidden for such role")]
    Forbidden,
}

/// Result type for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;
