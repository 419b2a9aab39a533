//! Domain types shared across the pipeline, server, and CLI.
//!
//! All structures parsed out of external service responses carry
//! `#[serde(default)]` on every optional field so a sparse or partially
//! malformed payload degrades to empty collections rather than a hard
//! deserialization failure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a source came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Text,
    Url,
    File,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Text => write!(f, "text"),
            SourceKind::Url => write!(f, "url"),
            SourceKind::File => write!(f, "file"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    /// Origin of the content: the fetched URL or the uploaded file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A unit of input content, normalized to plain text.
///
/// Created once from user input and never mutated afterwards; the research
/// step consumes sources read-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: Uuid,
    pub kind: SourceKind,
    pub title: String,
    pub content: String,
    pub word_count: usize,
    #[serde(default)]
    pub metadata: SourceMetadata,
    pub added_at: DateTime<Utc>,
}

/// A single finding produced by the research service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub text: String,
    /// Service-reported confidence in [0, 1]; 0 when absent.
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default)]
    pub title: String,
    pub url: String,
}

/// Structured findings returned by the research service, consumed by the
/// writing step as context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchResult {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub themes: Vec<String>,
    #[serde(default)]
    pub trends: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub citations: Vec<Citation>,
    #[serde(default = "Utc::now")]
    pub researched_at: DateTime<Utc>,
}

impl ResearchResult {
    /// True when the service returned nothing usable at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.insights.is_empty()
            && self.themes.is_empty()
            && self.trends.is_empty()
            && self.keywords.is_empty()
    }
}

/// The terminal artifact of the pipeline, offered for export once both
/// stages have completed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedArticle {
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub meta_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Writer-reported quality estimate, clamped to [0, 1].
    #[serde(default)]
    pub quality_score: f32,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default = "Utc::now")]
    pub generated_at: DateTime<Utc>,
}

/// Count whitespace-separated words; good enough for intake bookkeeping.
#[must_use]
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
