//! Pipeline step handlers: research, generate, export.
//!
//! Each handler snapshots the session, checks it is at the right step,
//! runs the (slow) pipeline call without holding the session lock, and
//! records the result afterwards. The session id doubles as the rate
//! limiter client key, so one session cannot starve another.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use copydesk_pipeline::wizard::{WizardSession, WizardStep};
use copydesk_pipeline::ExportOptions;

use crate::middleware::RequestId;

use super::{map_pipeline_error, session_not_found, ApiError, ApiResponse, AppState};

fn require_step(
    req_id: &str,
    session: &WizardSession,
    step: WizardStep,
    action: &str,
) -> Result<(), ApiError> {
    if session.step == step {
        Ok(())
    } else {
        Err(ApiError::new(
            req_id,
            "invalid_state",
            format!(
                "session is at the {} step; {action} requires the {step} step",
                session.step
            ),
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct BackRequest {
    pub to: WizardStep,
}

/// Rewinds the wizard to an earlier step, dropping downstream artifacts.
pub(in crate::api) async fn go_back(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    Json(body): Json<BackRequest>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    let session = state
        .sessions
        .modify(id, |session| {
            session.rewind(body.to).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok(Json(ApiResponse::new(req_id.0, session)))
}

pub(in crate::api) async fn run_research(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    // Close intake on the caller's behalf; advancing fails cleanly when
    // the session has no sources yet.
    let session = state
        .sessions
        .modify(id, |session| {
            if session.step == WizardStep::Intake {
                session.advance().map(|_| session.clone())
            } else {
                Ok(session.clone())
            }
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;
    require_step(&req_id.0, &session, WizardStep::Research, "research")?;

    let research = state
        .pipeline
        .run_research(&session.topic, &session.sources, &id.to_string())
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    let session = state
        .sessions
        .modify(id, |session| {
            session.record_research(research).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok(Json(ApiResponse::new(req_id.0, session)))
}

pub(in crate::api) async fn run_generate(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    let session = state
        .sessions
        .get(id)
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?;
    require_step(&req_id.0, &session, WizardStep::Write, "generation")?;
    let Some(research) = &session.research else {
        return Err(ApiError::new(
            req_id.0,
            "invalid_state",
            "session has no research to write from",
        ));
    };

    let article = state
        .pipeline
        .run_write(
            &session.topic,
            &session.template_id,
            research,
            &id.to_string(),
        )
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    let session = state
        .sessions
        .modify(id, |session| {
            session.record_article(article).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok(Json(ApiResponse::new(req_id.0, session)))
}

pub(in crate::api) async fn run_export(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<Uuid>,
    body: Option<Json<ExportOptions>>,
) -> Result<Json<ApiResponse<WizardSession>>, ApiError> {
    let options = body.map(|Json(o)| o).unwrap_or_default();

    // Approve on the caller's behalf when the session is still in review.
    let approved = state
        .sessions
        .modify(id, |session| {
            if session.step == WizardStep::Review {
                session.advance().map(|_| session.clone())
            } else {
                Ok(session.clone())
            }
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;
    require_step(&req_id.0, &approved, WizardStep::Export, "export")?;
    let Some(article) = &approved.article else {
        return Err(ApiError::new(
            req_id.0,
            "invalid_state",
            "session has no article to export",
        ));
    };

    let receipt = state
        .pipeline
        .run_export(article, &options, &id.to_string())
        .await
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e))?;

    let session = state
        .sessions
        .modify(id, |session| {
            session.record_export(receipt).map(|()| session.clone())
        })
        .await
        .ok_or_else(|| session_not_found(req_id.0.clone(), id))?
        .map_err(|e| map_pipeline_error(req_id.0.clone(), &e.into()))?;

    Ok(Json(ApiResponse::new(req_id.0, session)))
}
