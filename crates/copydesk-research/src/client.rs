//! HTTP client for the research service.
//!
//! Wraps `reqwest` with service-specific error handling, bearer-token auth,
//! and tolerant response deserialization. The `analyze` endpoint checks the
//! `"status"` field in the JSON envelope and surfaces API-level errors as
//! [`ResearchError::ApiError`].

use std::time::Duration;

use reqwest::{header, Client, StatusCode, Url};

use copydesk_core::retry::retry_with_backoff;
use copydesk_core::types::{ResearchResult, Source};

use crate::error::ResearchError;
use crate::types::{AnalyzeRequest, Document};

/// Client for the research service.
///
/// Construct with [`ResearchClient::new`]; point `base_url` at a mock
/// server in tests.
pub struct ResearchClient {
    client: Client,
    api_key: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl ResearchClient {
    /// Creates a new client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`ResearchError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn new(base_url: &str, api_key: &str, timeout_secs: u64) -> Result<Self, ResearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("copydesk/0.1 (research-client)")
            .build()?;

        // Normalise: ensure the base URL ends with exactly one slash so that
        // Url::join appends a path segment rather than replacing the last one.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| ResearchError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

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

    /// Runs web-grounded analysis of the given sources for `topic`.
    ///
    /// Transient failures (network errors, 5xx) are retried with back-off;
    /// everything else is returned on the first occurrence.
    ///
    /// # Errors
    ///
    /// - [`ResearchError::ApiError`] if the service reports an error status.
    /// - [`ResearchError::QuotaExceeded`] on HTTP 429.
    /// - [`ResearchError::Http`] on network failure or other non-2xx status.
    /// - [`ResearchError::Deserialize`] if the findings do not match the
    ///   expected shape.
    pub async fn analyze(
        &self,
        topic: &str,
        sources: &[Source],
    ) -> Result<ResearchResult, ResearchError> {
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_analyze(topic, sources)
        })
        .await
    }

    async fn send_analyze(
        &self,
        topic: &str,
        sources: &[Source],
    ) -> Result<ResearchResult, ResearchError> {
        let url = self.endpoint("analyze")?;
        let payload = AnalyzeRequest {
            topic,
            documents: sources
                .iter()
                .map(|s| Document {
                    title: &s.title,
                    content: &s.content,
                })
                .collect(),
        };

        let response = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await?;

        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            return Err(ResearchError::QuotaExceeded { retry_after_secs });
        }

        let response = response.error_for_status()?;
        let body: serde_json::Value = {
            let text = response.text().await?;
            serde_json::from_str(&text).map_err(|e| ResearchError::Deserialize {
                context: url.to_string(),
                source: e,
            })?
        };
        Self::check_api_error(&body)?;

        // Missing findings degrade to an all-default result; a present but
        // mistyped findings object is a real deserialization error.
        let findings = body
            .get("findings")
            .cloned()
            .unwrap_or_else(|| serde_json::json!({}));
        let result: ResearchResult =
            serde_json::from_value(findings).map_err(|e| ResearchError::Deserialize {
                context: format!("analyze(topic={topic})"),
                source: e,
            })?;

        if result.is_empty() {
            tracing::warn!(topic, "research service returned no usable findings");
        }

        Ok(result)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ResearchError> {
        self.base_url
            .join(path)
            .map_err(|e| ResearchError::ApiError(format!("invalid endpoint '{path}': {e}")))
    }

    /// Checks the top-level `"status"` field and returns an error if it
    /// indicates failure.
    fn check_api_error(body: &serde_json::Value) -> Result<(), ResearchError> {
        if body.get("status").and_then(serde_json::Value::as_str) == Some("error") {
            let msg = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown error")
                .to_string();
            return Err(ResearchError::ApiError(msg));
        }
        Ok(())
    }
}
