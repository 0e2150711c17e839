//! Currency refresh error types.

/// Errors produced by a rate source.
#[derive(Debug, thiserror::Error)]
pub enum RateError {
    /// The source page or API could not be fetched.
    #[error("Error loading rates from {source_name}: {detail}")]
    Load { source_name: String, detail: String },

    /// The fetched document did not have the expected structure.
    #[error("Error parsing rates from {source_name}: {detail}")]
    Parse { source_name: String, detail: String },
}

impl RateError {
    pub fn load(source: impl Into<String>, detail: impl ToString) -> Self {
        Self::Load {
            source_name: source.into(),
            detail: detail.to_string(),
        }
    }

    pub fn parse(source: impl Into<String>, detail: impl ToString) -> Self {
        Self::Parse {
            source_name: source.into(),
            detail: detail.to_string(),
        }
    }
}
