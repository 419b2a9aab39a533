//! Loose parsing of model output into a [`GeneratedArticle`].
//!
//! Models are asked for a single JSON object but routinely wrap it in
//! markdown fences or surround it with prose. The parser scans for the
//! first balanced JSON object, reads whatever fields it recognises, and
//! fills everything else with defaults. When no object can be found the
//! entire reply becomes the article body.

use chrono::Utc;
use serde::Deserialize;

use copydesk_core::types::GeneratedArticle;

/// Raw article fields as the model reports them; every field optional.
#[derive(Debug, Default, Deserialize)]
struct ArticleDraft {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, alias = "content")]
    body: Option<String>,
    #[serde(default, alias = "metaDescription")]
    meta_description: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default, alias = "score")]
    quality_score: Option<serde_json::Value>,
    #[serde(default)]
    excerpt: Option<String>,
}

/// Parses model output into an article, never failing.
///
/// `topic` supplies the fallback title when the model omits one.
#[must_use]
pub fn parse_article(topic: &str, raw: &str) -> GeneratedArticle {
    let draft = extract_json_object(raw)
        .and_then(|json| serde_json::from_str::<ArticleDraft>(&json).ok())
        .unwrap_or_default();

    let body = draft
        .body
        .filter(|b| !b.trim().is_empty())
        .unwrap_or_else(|| raw.trim().to_string());

    let title = draft
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| topic.trim().to_string());

    let excerpt = draft
        .excerpt
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| first_sentence(&body));

    GeneratedArticle {
        title,
        body,
        meta_description: draft.meta_description.unwrap_or_default(),
        tags: draft.tags,
        quality_score: coerce_score(draft.quality_score.as_ref()),
        excerpt,
        generated_at: Utc::now(),
    }
}

/// Extracts the first balanced `{...}` object from `raw`, skipping
/// anything before it (prose, markdown fences) and after it.
fn extract_json_object(raw: &str) -> Option<String> {
    let bytes = raw.as_bytes();
    let start = raw.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(raw[start..=start + offset].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

/// Accepts a numeric or numeric-string score, clamps to [0, 1]; anything
/// else scores 0.
fn coerce_score(value: Option<&serde_json::Value>) -> f32 {
    let raw = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    #[allow(clippy::cast_possible_truncation)]
    let score = raw.unwrap_or(0.0) as f32;
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// First sentence of `body`, or the first 200 characters when no sentence
/// boundary is found.
fn first_sentence(body: &str) -> String {
    let trimmed = body.trim();
    if let Some(i) = trimmed.find(". ") {
        return trimmed[..=i].to_string();
    }
    match trimmed.char_indices().nth(200) {
        Some((i, _)) => trimmed[..i].to_string(),
        None => trimmed.to_string(),
    }
}
