//! Normalization of user-supplied content into [`Source`] records.
//!
//! Raw text, URLs, and uploaded files all reduce to the same shape: a
//! title, plain-text content, and a word count. Validation runs first, so
//! nothing oversized or malformed reaches the research service.

use chrono::Utc;
use futures::stream::{self, StreamExt, TryStreamExt};
use scraper::{Html, Selector};
use uuid::Uuid;

use copydesk_core::types::{word_count, Source, SourceKind, SourceMetadata};
use copydesk_core::validation;

use crate::error::PipelineError;

/// How many URL fetches run concurrently in [`normalize_all`].
const FETCH_CONCURRENCY: usize = 4;

/// Maximum length of a derived title.
const TITLE_MAX_CHARS: usize = 80;

/// User input for one source, before normalization.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    Text { body: String },
    Url { url: String },
    File { name: String, content: String },
}

/// Normalizes one source spec.
///
/// # Errors
///
/// Returns validation errors for bad input and
/// [`PipelineError::SourceFetch`] when a URL cannot be retrieved.
pub async fn normalize(
    fetcher: &reqwest::Client,
    spec: SourceSpec,
) -> Result<Source, PipelineError> {
    match spec {
        SourceSpec::Text { body } => normalize_text(&body),
        SourceSpec::Url { url } => normalize_url(fetcher, &url).await,
        SourceSpec::File { name, content } => normalize_file(&name, &content),
    }
}

/// Normalizes a batch, fetching URLs a few at a time. Order is preserved;
/// the first failure aborts the batch.
///
/// # Errors
///
/// Propagates the first error from [`normalize`].
pub async fn normalize_all(
    fetcher: &reqwest::Client,
    specs: Vec<SourceSpec>,
) -> Result<Vec<Source>, PipelineError> {
    stream::iter(specs)
        .map(|spec| normalize(fetcher, spec))
        .buffered(FETCH_CONCURRENCY)
        .try_collect()
        .await
}

/// Normalizes pasted text. The first non-empty line doubles as the title.
///
/// # Errors
///
/// Returns validation errors for empty or oversized content.
pub fn normalize_text(body: &str) -> Result<Source, PipelineError> {
    validation::validate_source_content(body)?;
    let content = body.trim().to_string();
    Ok(Source {
        id: Uuid::new_v4(),
        kind: SourceKind::Text,
        title: derive_title(&content),
        word_count: word_count(&content),
        content,
        metadata: SourceMetadata::default(),
        added_at: Utc::now(),
    })
}

/// Fetches a URL and reduces the response to plain text. HTML responses
/// lose their markup; anything else is taken verbatim.
///
/// # Errors
///
/// Returns [`PipelineError::SourceFetch`] on network or HTTP failure and
/// validation errors when the fetched page yields no usable text.
pub async fn normalize_url(
    fetcher: &reqwest::Client,
    raw_url: &str,
) -> Result<Source, PipelineError> {
    let url = validation::validate_url(raw_url)?;

    let wrap = |source: reqwest::Error| PipelineError::SourceFetch {
        url: url.to_string(),
        source,
    };
    let response = fetcher
        .get(url.clone())
        .send()
        .await
        .map_err(wrap)?
        .error_for_status()
        .map_err(wrap)?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(ToOwned::to_owned);
    let body = response.text().await.map_err(wrap)?;

    let is_html = content_type
        .as_deref()
        .is_some_and(|ct| ct.contains("text/html"))
        || body.trim_start().starts_with("<!")
        || body.trim_start().starts_with("<html");

    let (page_title, content) = if is_html {
        html_to_text(&body)
    } else {
        (None, body.trim().to_string())
    };
    validation::validate_source_content(&content)?;

    let title = page_title
        .filter(|t| !t.trim().is_empty())
        .map_or_else(|| url.to_string(), |t| truncate_chars(t.trim(), TITLE_MAX_CHARS));

    Ok(Source {
        id: Uuid::new_v4(),
        kind: SourceKind::Url,
        title,
        word_count: word_count(&content),
        content,
        metadata: SourceMetadata {
            origin: Some(url.to_string()),
            content_type,
        },
        added_at: Utc::now(),
    })
}

/// Normalizes an uploaded text or markdown file. The file stem becomes
/// the title.
///
/// # Errors
///
/// Returns validation errors for disallowed extensions or bad content.
pub fn normalize_file(name: &str, content: &str) -> Result<Source, PipelineError> {
    validation::validate_file_name(name)?;
    validation::validate_source_content(content)?;

    let stem = name.rsplit_once('.').map_or(name, |(stem, _)| stem);
    let content = content.trim().to_string();
    Ok(Source {
        id: Uuid::new_v4(),
        kind: SourceKind::File,
        title: truncate_chars(stem, TITLE_MAX_CHARS),
        word_count: word_count(&content),
        content,
        metadata: SourceMetadata {
            origin: Some(name.to_string()),
            content_type: None,
        },
        added_at: Utc::now(),
    })
}

/// Extracts `<title>` and readable text from an HTML document.
///
/// Text is taken from content-bearing elements only, which skips script
/// and style blocks without needing a DOM filter pass.
fn html_to_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|sel| {
        document
            .select(&sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
    });

    let content_selector =
        Selector::parse("p, h1, h2, h3, h4, h5, h6, li, blockquote, article").ok();
    let mut chunks: Vec<String> = Vec::new();
    if let Some(sel) = &content_selector {
        for element in document.select(sel) {
            // `article` is in the selector to catch pages whose text sits
            // directly in the element; nested matches still come through
            // their own selector hit, so dedupe whitespace-only chunks.
            if element.value().name() == "article" {
                continue;
            }
            let text = element.text().collect::<String>();
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        }
    }

    let content = if chunks.is_empty() {
        // No semantic elements at all; fall back to every text node.
        document
            .root_element()
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        chunks.join("\n")
    };

    (title, content)
}

/// First non-empty line, truncated to [`TITLE_MAX_CHARS`].
fn derive_title(content: &str) -> String {
    let line = content
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("Untitled source");
    truncate_chars(line, TITLE_MAX_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((i, _)) => format!("{}…", &s[..i]),
        None => s.to_string(),
    }
}
