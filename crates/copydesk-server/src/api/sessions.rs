//! Session lifecycle handlers: create and fetch.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use copydesk_pipeline::wizard::WizardSession;

use crate::middleware::RequestId;

use super::{map_pipeline_error, session_not_found, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateSessionRequest {
    pub topic: String,
    pub template: Option<String>,
}

pub(in crate::api) async fn create_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<WizardSession>>), ApiError> {
    if let Some(template) = &body.template {
        if !state.pipeline.templates().contains(template) {
            return Err(ApiError::new(
                req_id.0,
                "bad_request",
                format!("unknown template '{template}'"),
            ));
        }
    }

    let session = WizardSession::new(&body.topic, body.template)
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;
    tracing::info!(session_id = %session.id, topic = %session.topic, "session created");

    let response = ApiResponse::new(req_id.0, session.clone());
    state.sessions.insert(session).await;
    Ok((StatusCode::CREATED, Json(response)))
}

pub(in crate::api) async fn get_session(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?;
    Ok(Json(ApiResponse::new(req_id.0, session)))
}
