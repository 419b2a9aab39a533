//! Integration tests for `ImageClient` using wiremock HTTP mocks.

use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use copydesk_images::{ImageClient, ImageError, DEFAULT_SIZE};

fn test_client(base_url: &str) -> ImageClient {
    ImageClient::new(base_url, "test-key", 30)
        .expect("client construction should not fail")
        .with_retry_policy(0, 0)
}

#[tokio::test]
async fn generate_returns_first_candidate_url() {
    let server = MockServer::start().await;

    let body = serde_json::json!({
        "images": [
            { "url": "https://cdn.example.com/a.png" },
            { "url": "https://cdn.example.com/b.png" }
        ]
    });

    Mock::given(method("POST"))
        .and(path("/generations"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(
            serde_json::json!({ "prompt": "a hero image", "size": DEFAULT_SIZE }),
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let image = client
        .generate("a hero image", DEFAULT_SIZE)
        .await
        .expect("should generate");
    assert_eq!(image.url, "https://cdn.example.com/a.png");
}

#[tokio::test]
async fn generate_rejects_empty_candidate_list() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "images": [] })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .generate("prompt", DEFAULT_SIZE)
        .await
        .expect_err("empty list must fail");
    assert!(matches!(err, ImageError::ApiError(m) if m.contains("no images")));
}

#[tokio::test]
async fn generate_maps_429_to_quota_exceeded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/generations"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client
        .generate("prompt", DEFAULT_SIZE)
        .await
        .expect_err("429 must surface");
    assert!(matches!(
        err,
        ImageError::QuotaExceeded {
            retry_after_secs: None
        }
    ));
}
