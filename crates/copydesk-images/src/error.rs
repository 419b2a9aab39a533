use copydesk_core::retry::{reqwest_error_is_transient, Transient};
use thiserror::Error;

/// Errors returned by the image generation client.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered but with nothing usable (no candidates, bad
    /// base URL, service-reported failure).
    #[error("image service error: {0}")]
    ApiError(String),

    /// HTTP 429 from the service.
    #[error("image service quota exceeded")]
    QuotaExceeded { retry_after_secs: Option<u64> },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Transient for ImageError {
    fn is_transient(&self) -> bool {
        match self {
            ImageError::Http(e) => reqwest_error_is_transient(e),
            ImageError::QuotaExceeded { .. }
            | ImageError::ApiError(_)
            | ImageError::Deserialize { .. } => false,
        }
    }
}
