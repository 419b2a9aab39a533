mod limits;
mod sessions;
mod sources;
mod steps;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use copydesk_pipeline::PipelineError;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};
pub use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    image_service: &'static str,
    cms: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Self {
        Self {
            data,
            meta: ResponseMeta::new(request_id),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" | "invalid_state" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            "not_configured" => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// Maps a pipeline failure onto the error envelope.
pub(super) fn map_pipeline_error(request_id: String, error: &PipelineError) -> ApiError {
    match error {
        PipelineError::Validation(e) => {
            ApiError::new(request_id, "validation_error", e.to_string())
        }
        PipelineError::Template(e) => ApiError::new(request_id, "bad_request", e.to_string()),
        PipelineError::Wizard(e @ copydesk_pipeline::wizard::WizardError::UnknownSource(_)) => {
            ApiError::new(request_id, "not_found", e.to_string())
        }
        PipelineError::Wizard(copydesk_pipeline::wizard::WizardError::Validation(e)) => {
            ApiError::new(request_id, "validation_error", e.to_string())
        }
        PipelineError::Wizard(e) => ApiError::new(request_id, "invalid_state", e.to_string()),
        PipelineError::RateLimited {
            service,
            retry_after,
        } => ApiError::new(
            request_id,
            "rate_limited",
            format!(
                "rate limit for the {service} service exceeded; retry in {}s",
                retry_after.as_secs().max(1)
            ),
        ),
        PipelineError::SourceFetch { .. } => {
            ApiError::new(request_id, "bad_request", error.to_string())
        }
        PipelineError::NotConfigured { .. } => {
            ApiError::new(request_id, "not_configured", error.to_string())
        }
        PipelineError::Research(_)
        | PipelineError::Writer(_)
        | PipelineError::Image(_)
        | PipelineError::Publish(_) => {
            tracing::error!(%error, "upstream service call failed");
            ApiError::new(request_id, "upstream_error", error.to_string())
        }
    }
}

pub(super) fn session_not_found(request_id: String, id: uuid::Uuid) -> ApiError {
    ApiError::new(request_id, "not_found", format!("no session with id {id}"))
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/sessions", post(sessions::create_session))
        .route("/api/v1/sessions/{id}", get(sessions::get_session))
        .route("/api/v1/sessions/{id}/sources", post(sources::add_source))
        .route(
            "/api/v1/sessions/{id}/sources/{source_id}",
            axum::routing::delete(sources::remove_source),
        )
        .route("/api/v1/sessions/{id}/back", post(steps::go_back))
        .route("/api/v1/sessions/{id}/research", post(steps::run_research))
        .route("/api/v1/sessions/{id}/generate", post(steps::run_generate))
        .route("/api/v1/sessions/{id}/export", post(steps::run_export))
        .route("/api/v1/limits", get(limits::list_limits))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let configured = |yes: bool| if yes { "configured" } else { "absent" };
    (
        StatusCode::OK,
        Json(ApiResponse::new(
            req_id.0,
            HealthData {
                status: "ok",
                image_service: configured(state.pipeline.can_generate_images()),
                cms: configured(state.pipeline.can_publish()),
            },
        )),
    )
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::api::test_support::offline_state;

    fn dev_auth() -> AuthState {
        AuthState::with_keys(Vec::new())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&body).expect("json parse")
    }

    #[tokio::test]
    async fn health_reports_optional_services() {
        let app = build_app(offline_state(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"].as_str(), Some("ok"));
        assert_eq!(json["data"]["cms"].as_str(), Some("absent"));
        assert!(json["meta"]["request_id"].is_string());
    }

    #[tokio::test]
    async fn request_id_header_is_echoed_back() {
        let app = build_app(offline_state(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .header("x-request-id", "trace-me-123")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response.headers().get("x-request-id").map(|v| v.to_str().ok()),
            Some(Some("trace-me-123"))
        );
    }

    #[tokio::test]
    async fn protected_routes_require_bearer_token_when_enabled() {
        let auth = AuthState::with_keys(vec!["secret-token".to_string()]);

        let app = build_app(offline_state(), auth.clone(), default_rate_limit_state());
        let denied = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/limits")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let app = build_app(offline_state(), auth, default_rate_limit_state());
        let allowed = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/limits")
                    .header("authorization", "Bearer secret-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(allowed.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_returns_not_found_envelope() {
        let app = build_app(offline_state(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/sessions/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("not_found"));
    }

    #[tokio::test]
    async fn create_session_then_fetch_it() {
        let state = offline_state();
        let app = build_app(state.clone(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"topic": "the state of rust tooling", "template": "listicle"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["data"]["step"].as_str(), Some("intake"));
        assert_eq!(json["data"]["template_id"].as_str(), Some("listicle"));
        let id = json["data"]["id"].as_str().expect("session id").to_string();

        let app = build_app(state, dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/v1/sessions/{id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_session_rejects_unknown_template() {
        let app = build_app(offline_state(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"topic": "a valid topic", "template": "no-such-template"}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("bad_request"));
    }

    #[tokio::test]
    async fn add_text_source_and_remove_it() {
        let state = offline_state();
        let app = build_app(state.clone(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic": "a valid topic"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(response).await;
        let id = json["data"]["id"].as_str().expect("session id").to_string();

        let app = build_app(state.clone(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/sessions/{id}/sources"))
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"kind": "text", "body": "Briefing\n\nSome notes to research."}"#,
                    ))
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        let sources = json["data"]["sources"].as_array().expect("sources");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0]["title"].as_str(), Some("Briefing"));
        let source_id = sources[0]["id"].as_str().expect("source id").to_string();

        let app = build_app(state, dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/sessions/{id}/sources/{source_id}"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["sources"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn create_session_rejects_short_topic_as_validation_error() {
        let app = build_app(offline_state(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic": "ab"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("validation_error"));
    }

    #[tokio::test]
    async fn research_without_sources_is_a_state_conflict() {
        let state = offline_state();
        let app = build_app(state.clone(), dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/sessions")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"topic": "a valid topic"}"#))
                    .expect("request"),
            )
            .await
            .expect("response");
        let json = body_json(response).await;
        let id = json["data"]["id"].as_str().expect("session id").to_string();

        // Intake with no sources cannot be closed, so the handler must
        // refuse before any upstream call.
        let app = build_app(state, dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/sessions/{id}/research"))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"].as_str(), Some("invalid_state"));
    }

    async fn post_json(
        state: &crate::state::AppState,
        uri: String,
        body: &str,
    ) -> axum::response::Response {
        let app = build_app(state.clone(), dev_auth(), default_rate_limit_state());
        app.oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .expect("request"),
        )
        .await
        .expect("response")
    }

    #[tokio::test]
    async fn session_flow_runs_research_generate_export_over_http() {
        use wiremock::matchers::{body_partial_json, method, path, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let research_server = MockServer::start().await;
        let writer_server = MockServer::start().await;
        let cms_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/analyze"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "findings": {
                    "summary": "Reader habits are shifting.",
                    "insights": [
                        { "text": "Newsletter growth outpaces blogs.", "confidence": 0.8 }
                    ]
                }
            })))
            .expect(1)
            .mount(&research_server)
            .await;

        let article_json = r#"{"title": "The Newsletter Shift", "body": "Body text. More body.",
            "tags": ["publishing"], "quality_score": 0.8}"#;
        Mock::given(method("POST"))
            .and(path("/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [ { "message": { "content": article_json } } ]
            })))
            .expect(1)
            .mount(&writer_server)
            .await;

        Mock::given(method("GET"))
            .and(path("/categories"))
            .and(query_param("slug", "media"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&cms_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/categories"))
            .respond_with(ResponseTemplate::new(201).set_body_json(
                serde_json::json!({ "id": 41, "name": "Media", "slug": "media" }),
            ))
            .mount(&cms_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/tags"))
            .and(query_param("slug", "publishing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!([{ "id": 9, "name": "publishing", "slug": "publishing" }]),
            ))
            .mount(&cms_server)
            .await;
        Mock::given(method("POST"))
            .and(path("/posts"))
            .and(body_partial_json(
                serde_json::json!({ "title": "The Newsletter Shift", "status": "draft" }),
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": 107,
                "link": "https://cms.example/posts/107",
                "status": "draft"
            })))
            .expect(1)
            .mount(&cms_server)
            .await;

        let state = crate::api::test_support::app_state(
            &research_server.uri(),
            &writer_server.uri(),
            Some(&cms_server.uri()),
        );

        let response = post_json(
            &state,
            "/api/v1/sessions".to_string(),
            r#"{"topic": "the shift to newsletters"}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        let id = json["data"]["id"].as_str().expect("session id").to_string();

        let response = post_json(
            &state,
            format!("/api/v1/sessions/{id}/sources"),
            r#"{"kind": "text", "body": "Briefing\n\nNotes on reader habits."}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = post_json(&state, format!("/api/v1/sessions/{id}/research"), "{}").await;
        assert_eq!(response.status(), StatusCode::OK, "research step failed");
        let json = body_json(response).await;
        assert_eq!(json["data"]["step"].as_str(), Some("write"));
        assert_eq!(
            json["data"]["research"]["summary"].as_str(),
            Some("Reader habits are shifting.")
        );

        let response = post_json(&state, format!("/api/v1/sessions/{id}/generate"), "{}").await;
        assert_eq!(response.status(), StatusCode::OK, "generate step failed");
        let json = body_json(response).await;
        assert_eq!(json["data"]["step"].as_str(), Some("review"));
        assert_eq!(
            json["data"]["article"]["title"].as_str(),
            Some("The Newsletter Shift")
        );

        let response = post_json(
            &state,
            format!("/api/v1/sessions/{id}/export"),
            r#"{"categories": ["Media"]}"#,
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK, "export step failed");
        let json = body_json(response).await;
        assert_eq!(json["data"]["step"].as_str(), Some("done"));
        assert_eq!(json["data"]["export"]["post_id"].as_i64(), Some(107));
    }

    #[tokio::test]
    async fn limits_endpoint_lists_active_windows() {
        let state = offline_state();
        state
            .pipeline
            .limiter()
            .try_acquire("research", "session-1")
            .await
            .expect("slot");

        let app = build_app(state, dev_auth(), default_rate_limit_state());
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/limits")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let rows = json["data"].as_array().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["service"].as_str(), Some("research"));
        assert_eq!(rows[0]["in_window"].as_u64(), Some(1));
    }
}
