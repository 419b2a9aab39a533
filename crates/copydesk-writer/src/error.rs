use copydesk_core::retry::{reqwest_error_is_transient, Transient};
use thiserror::Error;

/// Errors returned by the writing service client.
#[derive(Debug, Error)]
pub enum WriterError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service returned an application-level error message.
    #[error("writing service error: {0}")]
    ApiError(String),

    /// HTTP 429 from the service.
    #[error("writing service quota exceeded")]
    QuotaExceeded { retry_after_secs: Option<u64> },

    /// The completion envelope itself could not be deserialized.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// The service answered 2xx but with no candidates to read.
    #[error("writing service returned an empty completion")]
    EmptyCompletion,
}

impl Transient for WriterError {
    fn is_transient(&self) -> bool {
        match self {
            WriterError::Http(e) => reqwest_error_is_transient(e),
            WriterError::QuotaExceeded { .. }
            | WriterError::ApiError(_)
            | WriterError::Deserialize { .. }
            | WriterError::EmptyCompletion => false,
        }
    }
}
