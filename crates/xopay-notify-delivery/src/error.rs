//! Delivery error types.

/// Errors returned by the outbound HTTP client.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Connection failure, TLS failure or timeout.
    #[error("HTTP request error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The upstream answered with a status other than 200.
    #[error("HTTP wrong status {status}: {detail}")]
    UpstreamStatus { status: u16, detail: String },

    /// The response body was not valid JSON.
    #[error("HTTP bad response: {0}")]
    Decode(#[source] reqwest::Error),

    /// A system token could not be minted for the request.
    #[error("Auth error: {0}")]
    Auth(#[from] xopay_notify_auth::AuthError),
}

/// Result type for delivery operations.
pub type DeliveryResult<T> = Result<T, DeliveryError>;
