//! Input validation for user-supplied topics, sources, and file uploads.
//!
//! Everything here runs before any network call: a request that fails
//! validation is never sent upstream.

use thiserror::Error;

pub const TOPIC_MIN_CHARS: usize = 3;
pub const TOPIC_MAX_CHARS: usize = 200;
pub const MAX_SOURCE_WORDS: usize = 100_000;
pub const MAX_SOURCES_PER_SESSION: usize = 10;
pub const ALLOWED_FILE_EXTENSIONS: [&str; 3] = ["txt", "md", "markdown"];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("topic must be between {TOPIC_MIN_CHARS} and {TOPIC_MAX_CHARS} characters, got {len}")]
    TopicLength { len: usize },

    #[error("source content is empty")]
    EmptyContent,

    #[error("source has {words} words, exceeding the maximum of {MAX_SOURCE_WORDS}")]
    SourceTooLarge { words: usize },

    #[error("a session holds at most {MAX_SOURCES_PER_SESSION} sources")]
    TooManySources,

    #[error("at least one source is required before research can run")]
    NoSources,

    #[error("invalid URL: {reason}")]
    InvalidUrl { reason: String },

    #[error("unsupported URL scheme '{scheme}'; only http and https are accepted")]
    UnsupportedScheme { scheme: String },

    #[error("unsupported file type '{extension}'; accepted: txt, md, markdown")]
    UnsupportedFileType { extension: String },
}

/// Validates and normalizes a topic, returning the trimmed form.
///
/// # Errors
///
/// Returns [`ValidationError::TopicLength`] when the trimmed topic is
/// shorter than [`TOPIC_MIN_CHARS`] or longer than [`TOPIC_MAX_CHARS`].
pub fn validate_topic(topic: &str) -> Result<String, ValidationError> {
    let trimmed = topic.trim();
    let len = trimmed.chars().count();
    if !(TOPIC_MIN_CHARS..=TOPIC_MAX_CHARS).contains(&len) {
        return Err(ValidationError::TopicLength { len });
    }
    Ok(trimmed.to_string())
}

/// Validates raw source content before normalization.
///
/// # Errors
///
/// Returns [`ValidationError::EmptyContent`] for blank input and
/// [`ValidationError::SourceTooLarge`] past the word cap.
pub fn validate_source_content(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    let words = crate::types::word_count(content);
    if words > MAX_SOURCE_WORDS {
        return Err(ValidationError::SourceTooLarge { words });
    }
    Ok(())
}

/// Checks that one more source fits under the per-session cap.
///
/// # Errors
///
/// Returns [`ValidationError::TooManySources`] when the session is full.
pub fn validate_source_count(current: usize) -> Result<(), ValidationError> {
    if current >= MAX_SOURCES_PER_SESSION {
        return Err(ValidationError::TooManySources);
    }
    Ok(())
}

/// Ensures a research run has material to work with.
///
/// # Errors
///
/// Returns [`ValidationError::NoSources`] for an empty source set.
pub fn ensure_sources_present(count: usize) -> Result<(), ValidationError> {
    if count == 0 {
        return Err(ValidationError::NoSources);
    }
    Ok(())
}

/// Parses and validates a source URL; only http(s) is accepted.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidUrl`] for unparsable input and
/// [`ValidationError::UnsupportedScheme`] for anything but http(s).
pub fn validate_url(raw: &str) -> Result<reqwest::Url, ValidationError> {
    let url = reqwest::Url::parse(raw.trim()).map_err(|e| ValidationError::InvalidUrl {
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme {
            scheme: other.to_string(),
        }),
    }
}

/// Validates an uploaded file name against the extension allowlist.
///
/// # Errors
///
/// Returns [`ValidationError::UnsupportedFileType`] for anything that is
/// not plain text or markdown.
pub fn validate_file_name(file_name: &str) -> Result<(), ValidationError> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    if ALLOWED_FILE_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType { extension })
    }
}
