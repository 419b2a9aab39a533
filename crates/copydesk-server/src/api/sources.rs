//! Source intake handlers: add a text/url/file source, remove one.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use uuid::Uuid;

use copydesk_pipeline::sources::{self, SourceSpec};
use copydesk_pipeline::wizard::WizardSession;

use crate::middleware::RequestId;

use super::{map_pipeline_error, session_not_found, ApiError, ApiResponse, AppState};

pub(in crate::api) async fn add_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(spec): Json<SourceSpec>,
) -> Result<(StatusCode, Json<ApiResponse<WizardSession>>), ApiError> {
    if state.sessions.get(id).await.is_none() {
        return Err(session_not_found(req_id.0, id));
    }

    // Normalization (and any URL fetch) happens outside the session lock.
    let source = sources::normalize(&state.fetcher, spec)
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    let session = state
        .sessions
        .modify(id, |session| {
            session.add_source(source).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(req_id.0, session))))
}

pub(in crate::api) async fn remove_source(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((id, source_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    let session = state
        .sessions
        .modify(id, |session| {
            session.remove_source(source_id).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok(Json(ApiResponse::new(req_id.0, session)))
}
