use copydesk_core::retry::{reqwest_error_is_transient, Transient};
use thiserror::Error;

/// Errors returned by the research service client.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned `"status": "error"` with a message.
    #[error("research service error: {0}")]
    ApiError(String),

    /// HTTP 429 from the service; `retry_after_secs` comes from the
    /// `retry-after` header when present.
    #[error("research service quota exceeded")]
    QuotaExceeded { retry_after_secs: Option<u64> },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Transient for ResearchError {
    fn is_transient(&self) -> bool {
        match self {
            ResearchError::Http(e) => reqwest_error_is_transient(e),
            // A 429 is handled by the rate limiter, not by blind retry.
            ResearchError::QuotaExceeded { .. }
            | ResearchError::ApiError(_)
            | ResearchError::Deserialize { .. } => false,
        }
    }
}
