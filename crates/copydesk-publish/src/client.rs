//! HTTP client for the CMS publishing target.

use std::time::Duration;

use reqwest::{header, Client, Url};
use serde::de::DeserializeOwned;

use copydesk_core::retry::retry_with_backoff;

use crate::error::PublishError;
use crate::types::{CreatedPost, Media, NewPost, Term};

/// Client for the CMS REST API.
pub struct PublishClient {
    client: Client,
    token: String,
    base_url: Url,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl PublishClient {
    /// Creates a new client for the CMS at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed, or [`PublishError::ApiError`] if `base_url`
    /// is not a valid URL.
    pub fn new(base_url: &str, token: &str, timeout_secs: u64) -> Result<Self, PublishError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("copydesk/0.1 (publish-client)")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised)
            .map_err(|e| PublishError::ApiError(format!("invalid base URL '{base_url}': {e}")))?;

        Ok(Self {
            client,
            token: token.to_owned(),
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

    /// Creates a post on the CMS.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Http`] on network failure or non-2xx status,
    /// [`PublishError::Deserialize`] on an unexpected response shape.
    pub async fn create_post(&self, post: &NewPost) -> Result<CreatedPost, PublishError> {
        let url = self.endpoint("posts")?;
        retry_with_backoff(self.max_retries, self.backoff_base_ms, || async {
            let response = self
                .client
                .post(url.clone())
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
                .json(post)
                .send()
                .await?
                .error_for_status()?;
            Self::parse_json(&url, response).await
        })
        .await
    }

    /// Returns the id of the category named `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PublishClient::create_post`].
    pub async fn ensure_category(&self, name: &str) -> Result<i64, PublishError> {
        self.ensure_term("categories", name).await
    }

    /// Returns the id of the tag named `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`PublishClient::create_post`].
    pub async fn ensure_tag(&self, name: &str) -> Result<i64, PublishError> {
        self.ensure_term("tags", name).await
    }

    /// Downloads the image at `source_url` and uploads it to the CMS media
    /// library under `file_name`.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MediaDownload`] when the image itself cannot
    /// be fetched, otherwise the usual client failure modes.
    pub async fn upload_media_from_url(
        &self,
        source_url: &str,
        file_name: &str,
    ) -> Result<Media, PublishError> {
        let download = self.client.get(source_url).send().await?;
        if !download.status().is_success() {
            return Err(PublishError::MediaDownload {
                url: source_url.to_string(),
                status: download.status().as_u16(),
            });
        }
        let content_type = download
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = download.bytes().await?;

        let url = self.endpoint("media")?;
        let response = self
            .client
            .post(url.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header(header::CONTENT_TYPE, content_type)
            .header(
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            )
            .body(bytes)
            .send()
            .await?
            .error_for_status()?;
        Self::parse_json(&url, response).await
    }

    async fn ensure_term(&self, taxonomy: &str, name: &str) -> Result<i64, PublishError> {
        let slug = slugify(name);

        let mut lookup = self.endpoint(taxonomy)?;
        lookup.query_pairs_mut().append_pair("slug", &slug);
        let response = self
            .client
            .get(lookup.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?
            .error_for_status()?;
        let existing: Vec<Term> = Self::parse_json(&lookup, response).await?;
        if let Some(term) = existing.into_iter().find(|t| t.slug == slug) {
            return Ok(term.id);
        }

        tracing::debug!(taxonomy, name, slug, "term not found, creating");
        let create = self.endpoint(taxonomy)?;
        let response = self
            .client
            .post(create.clone())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .json(&serde_json::json!({ "name": name, "slug": slug }))
            .send()
            .await?
            .error_for_status()?;
        let term: Term = Self::parse_json(&create, response).await?;
        Ok(term.id)
    }

    async fn parse_json<T: DeserializeOwned>(
        url: &Url,
        response: reqwest::Response,
    ) -> Result<T, PublishError> {
        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| PublishError::Deserialize {
            context: url.to_string(),
            source: e,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PublishError> {
        self.base_url
            .join(path)
            .map_err(|e| PublishError::ApiError(format!("invalid endpoint '{path}': {e}")))
    }
}

/// Lowercases `name` and collapses runs of non-alphanumerics into single
/// hyphens, the way CMS term slugs are conventionally formed.
#[must_use]
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_was_hyphen = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hemp Drinks"), "hemp-drinks");
        assert_eq!(slugify("CBD & THC"), "cbd-thc");
        assert_eq!(slugify("  spaced  out  "), "spaced-out");
        assert_eq!(slugify("already-slugged"), "already-slugged");
    }

    #[test]
    fn slugify_drops_leading_and_trailing_separators() {
        assert_eq!(slugify("!!bang!!"), "bang");
        assert_eq!(slugify(""), "");
    }
}
