//! Integration tests for `ResearchClient` using wiremock HTTP mocks.

use chrono::Utc;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use copydesk_core::types::{Source, SourceKind, SourceMetadata};
use copydesk_research::{ResearchClient, ResearchError};

fn test_client(base_url: &str) -> ResearchClient {
    ResearchClient::new(base_url, "test-key", 30)
        .expect("client construction should not fail")
        .with_retry_policy(0, 0)
}

fn text_source(title: &str, content: &str) -> Source {
    Source {
        id: Uuid::new_v4(),
        kind: SourceKind::Text,
        title: title.to_string(),
        content: content.to_string(),
        word_count: content.split_whitespace().count(),
        metadata: SourceMetadata::default(),
        added_at: Utc::now(),
    }
}

#[tokio::test]
async fn analyze_returns_parsed_findings() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "ok",
        "findings": {
            "summary": "Hemp beverages are trending upward.",
            "insights": [
                { "text": "Retail distribution doubled year over year.", "confidence": 0.9 }
            ],
            "themes": ["distribution", "regulation"],
            "trends": ["functional drinks"],
            "keywords": ["hemp", "seltzer"],
            "citations": [
                { "title": "Market report", "url": "https://example.com/report" }
            ]
        }
    });

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(serde_json::json!({ "topic": "hemp drinks" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let sources = vec![text_source("Notes", "hemp seltzer notes")];
    let result = client
        .analyze("hemp drinks", &sources)
        .await
        .expect("should parse findings");

    assert_eq!(result.summary, "Hemp beverages are trending upward.");
    assert_eq!(result.insights.len(), 1);
    assert!((result.insights[0].confidence - 0.9).abs() < 1e-6);
    assert_eq!(result.themes, vec!["distribution", "regulation"]);
    assert_eq!(result.citations[0].url, "https://example.com/report");
}

#[tokio::test]
async fn analyze_defaults_missing_fields() {
    let server = MockServer::start().await;

    // Only a summary comes back; every other field must default.
    let body = serde_json::json!({
        "status": "ok",
        "findings": { "summary": "thin result" }
    });

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let sources = vec![text_source("Notes", "words")];
    let result = client.analyze("topic here", &sources).await.expect("parse");

    assert_eq!(result.summary, "thin result");
    assert!(result.insights.is_empty());
    assert!(result.themes.is_empty());
    assert!(result.keywords.is_empty());
}

#[tokio::test]
async fn analyze_tolerates_absent_findings_object() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "status": "ok" })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let sources = vec![text_source("Notes", "words")];
    let result = client.analyze("topic here", &sources).await.expect("parse");
    assert!(result.is_empty());
}

#[tokio::test]
async fn analyze_surfaces_api_error() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "status": "error",
        "error": { "message": "corpus too small" }
    });

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let sources = vec![text_source("Notes", "words")];
    let err = client
        .analyze("topic here", &sources)
        .await
        .expect_err("error status must surface");
    assert!(matches!(err, ResearchError::ApiError(m) if m == "corpus too small"));
}

#[tokio::test]
async fn analyze_maps_429_to_quota_exceeded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/analyze"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "17"))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let sources = vec![text_source("Notes", "words")];
    let err = client
        .analyze("topic here", &sources)
        .await
        .expect_err("429 must surface");
    assert!(matches!(
        err,
        ResearchError::QuotaExceeded {
            retry_after_secs: Some(17)
        }
    ));
}
