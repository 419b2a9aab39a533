//! Rate limiter introspection.

use axum::{extract::State, Extension, Json};

use copydesk_pipeline::rate_limit::WindowStatus;

use crate::middleware::RequestId;

use super::{ApiResponse, AppState};

pub(in crate::api) async fn list_limits(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<Vec<WindowStatus>>> {
    let rows = state.pipeline.limiter().snapshot().await;
    Json(ApiResponse::new(req_id.0, rows))
}
