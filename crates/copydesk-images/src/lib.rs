//! Client for the text-to-image generation service.
//!
//! One endpoint: prompt in, a list of candidate image URLs out. The first
//! candidate wins; an empty list is an API error.

mod error;

use std::time::Duration;

use reqwest::{header, Client, StatusCode, Url};
use serde::{Deserialize, Serialize};

use copydesk_core::retry::retry_with_backoff;

pub use error::ImageError;

pub const DEFAULT_SIZE: &str = "1024x1024";

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    size: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    images: Vec<ImageCandidate>,
}

#[derive(Debug, Deserialize)]
struct ImageCandidate {
    url: String,
}

/// A generated image, referenced by URL on the service's CDN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub url: String,
}

/// Client for the image generation service.
pub struct ImageClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ImageClient {
    /// Creates a new client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ImageError::ApiError`] if `base_url` is
    /// not a valid URL.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ImageError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("copydesk/0.1 (image-client)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ImageError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            max_retries: 3,
            backoff_base_ms: 1_000,
        })
    }

    /// Overrides the default retry policy (3 retries, 1 s base back-off).
    #[must_use]
    pub fn with_retry_policy(mut self, max_retries: u32, backoff_base_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Generates one image for `prompt` at the given size (e.g. `1024x1024`).
    ///
    /// # Errors
    ///
    /// - [`ImageError::QuotaExceeded`] on HTTP 429.
    /// - [`ImageError::Http`] on network failure or other non-2xx status.
    /// - [`ImageError::ApiError`] when the service returns no candidates.
    /// - [`ImageError::Deserialize`] on a malformed response body.
    pub async fn generate(&self, prompt: &str, size: &str) -> Result<GeneratedImage, ImageError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_generation(prompt, size)
        })
        .await
    }

    async fn send_generation(
        &self,
        prompt: &str,
        size: &str,
    ) -> Result<GeneratedImage, ImageError> {
        let url = self
            .base_url
            .join("generations")
            .map_err(|e| ImageError::ApiError(format!("invalid endpoint: {e}")))?;

        let response = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&GenerationRequest { prompt, size })
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ImageError::QuotaExceeded { retry_after_secs });
        }

        let response = response.error_for_status()?;
        let text = response.text().await?;
        let envelope: GenerationResponse =
            serde_json::from_str(&text).map_err(|e| ImageError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        envelope
            .images
            .into_iter()
            .next()
            .map(|c| GeneratedImage { url: c.url })
            .ok_or_else(|| ImageError::ApiError("service returned no images".to_string()))
    }
}
