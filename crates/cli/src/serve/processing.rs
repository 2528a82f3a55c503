//! Processing-run routes: start, poll, cancel, and research.

use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::Json;

use super::error::ApiError;
use super::state::AppState;

/// POST /api/process-materials/{id}
///
/// Returns once the run is launched; poll the status route for progress.
pub(crate) async fn handle_start_processing(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = path?;
    let execution = state.procurement.processing.start(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Processing started",
        "execution": execution,
    })))
}

/// GET /api/process-materials/{id}/status
pub(crate) async fn handle_processing_status(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = path?;
    let snapshot = state.procurement.processing.status(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "processingStatus": snapshot.processing_status,
        "status": snapshot.status,
    })))
}

/// POST /api/process-materials/{id}/cancel
pub(crate) async fn handle_cancel_processing(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = path?;
    let execution = state.procurement.processing.cancel(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Processing cancelled",
        "execution": execution,
    })))
}

/// POST /api/executions/{id}/research
pub(crate) async fn handle_research(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Path(id) = path?;
    let execution = state.procurement.processing.research(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Research triggered successfully",
        "execution": execution,
    })))
}
