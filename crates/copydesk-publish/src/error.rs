use copydesk_core::retry::{reqwest_error_is_transient, Transient};
use thiserror::Error;

/// Errors returned by the CMS publishing client.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The CMS rejected the request at the application level.
    #[error("CMS error: {0}")]
    ApiError(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Fetching the image bytes for a media upload failed.
    #[error("failed to download media from {url}: HTTP {status}")]
    MediaDownload { url: String, status: u16 },
}

impl Transient for PublishError {
    fn is_transient(&self) -> bool {
        match self {
            PublishError::Http(e) => reqwest_error_is_transient(e),
            PublishError::ApiError(_)
            | PublishError::Deserialize { .. }
            | PublishError::MediaDownload { .. } => false,
        }
    }
}
