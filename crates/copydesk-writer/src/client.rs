//! HTTP client for the writing service.

use std::time::Duration;

use reqwest::{header, Client, StatusCode, Url};

use copydesk_core::retry::retry_with_backoff;
use copydesk_core::types::GeneratedArticle;

use crate::error::WriterError;
use crate::parse::parse_article;
use crate::types::{CompletionRequest, CompletionResponse, Message};

const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 4_096;

/// Client for the writing service.
pub struct WriterClient {
    client: Client,
    api_key: String,
    base_url: Url,
    model: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl WriterClient {
    /// Creates a new client for the service at `base_url`, generating with
    /// `model`.
    ///
    /// # Errors
    ///
    /// Returns [`WriterError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`WriterError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn new(
        base_url: &str,
        api_key: &str,
        model: &str,
        timeout_secs: u64,
    ) -> Result<Self, WriterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("copydesk/0.1 (writer-client)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| WriterError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            api_key: api_key.to_owned(),
            base_url,
            model: model.to_owned(),
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

    /// Generates an article from an already-rendered prompt.
    ///
    /// `topic` is only used as the fallback title when the model's output
    /// omits one; the prompt carries all actual instructions.
    ///
    /// # Errors
    ///
    /// - [`WriterError::QuotaExceeded`] on HTTP 429.
    /// - [`WriterError::Http`] on network failure or other non-2xx status.
    /// - [`WriterError::Deserialize`] if the completion envelope is
    ///   malformed.
    /// - [`WriterError::EmptyCompletion`] when no candidate text came back.
    pub async fn generate(
        &self,
        topic: &str,
        prompt: &str,
    ) -> Result<GeneratedArticle, WriterError> {
        let text = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.send_completion(prompt)
        })
        .await?;
        Ok(parse_article(topic, &text))
    }

    async fn send_completion(&self, prompt: &str) -> Result<String, WriterError> {
        let url = self.endpoint("completions")?;
        let payload = CompletionRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
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
            return Err(WriterError::QuotaExceeded { retry_after_secs });
        }

        let response = response.error_for_status()?;
        let text = response.text().await?;
        let envelope: CompletionResponse =
            serde_json::from_str(&text).map_err(|e| WriterError::Deserialize {
                context: url.to_string(),
                source: e,
            })?;

        let content = envelope
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or(WriterError::EmptyCompletion)?;

        Ok(content)
    }

    fn endpoint(&self, path: &str) -> Result<Url, WriterError> {
        self.base_url
            .join(path)
            .map_err(|e| WriterError::ApiError(format!("invalid endpoint '{path}': {e}")))
    }
}
