//! Queue error types.

/// Errors from the AMQP consumer and the queue handlers.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Broker connection, channel or protocol failure.
    #[error("Queue connection error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker connection dropped while consuming.
    #[error("Queue connection lost")]
    ConnectionLost,
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;
