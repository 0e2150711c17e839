//! Engine and rule-store error types.

/// Errors from the rule store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A rule with this id already exists.
    #[error("Rule {0} already exists")]
    Conflict(String),

    /// Backend failure.
    #[error("Rule store error: {0}")]
    Internal(String),
}

/// Errors surfaced by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),
}
