//! Core HTTP route handlers: health, executions, vendors, activity.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use vendorflow_engine::executions::parse_status;
use vendorflow_engine::{ExecutionPatch, NewExecution, VendorStatusUpdate};

use super::error::ApiError;
use super::state::AppState;

type JsonResult = Result<Json<serde_json::Value>, ApiError>;

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    ApiError::new(StatusCode::NOT_FOUND, "Route not found")
}

/// GET /health
pub(crate) async fn handle_health() -> impl IntoResponse {
    let response = serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(response))
}

/// GET /api/executions
pub(crate) async fn handle_list_executions(State(state): State<Arc<AppState>>) -> JsonResult {
    let executions = state.procurement.executions.list(None).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "executions": executions,
    })))
}

/// GET /api/executions/status/{status}
pub(crate) async fn handle_list_by_status(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> JsonResult {
    let Path(raw) = path?;
    let status = parse_status(&raw)?;
    let executions = state.procurement.executions.list(Some(status)).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "executions": executions,
    })))
}

/// GET /api/executions/{id}
pub(crate) async fn handle_get_execution(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> JsonResult {
    let Path(id) = path?;
    let execution = state.procurement.executions.get(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "execution": execution,
    })))
}

/// POST /api/executions
pub(crate) async fn handle_create_execution(
    State(state): State<Arc<AppState>>,
    body: Result<Json<NewExecution>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(new) = body?;
    let execution = state.procurement.executions.create(new).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "success": true,
            "message": "Execution created successfully",
            "execution": execution,
        })),
    ))
}

/// PUT /api/executions/{id}
pub(crate) async fn handle_update_execution(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<ExecutionPatch>, JsonRejection>,
) -> JsonResult {
    let Path(id) = path?;
    let Json(patch) = body?;
    let execution = state.procurement.executions.update(&id, patch).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Execution updated successfully",
        "execution": execution,
    })))
}

/// DELETE /api/executions/{id}
pub(crate) async fn handle_delete_execution(
    State(state): State<Arc<AppState>>,
    path: Result<Path<String>, PathRejection>,
) -> JsonResult {
    let Path(id) = path?;
    state.procurement.executions.delete(&id).await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Execution deleted successfully",
    })))
}

/// PUT /api/executions/{id}/vendors/{index}
pub(crate) async fn handle_update_vendor(
    State(state): State<Arc<AppState>>,
    path: Result<Path<(String, String)>, PathRejection>,
    body: Result<Json<VendorStatusUpdate>, JsonRejection>,
) -> JsonResult {
    let Path((id, index)) = path?;
    let Json(update) = body?;
    let execution = state
        .procurement
        .executions
        .update_vendor_status(&id, &index, update)
        .await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Vendor status updated successfully",
        "execution": execution,
    })))
}

/// GET /api/recent-activity
pub(crate) async fn handle_recent_activity(State(state): State<Arc<AppState>>) -> JsonResult {
    let activities = state.procurement.activity.recent().await?;
    Ok(Json(serde_json::json!({
        "success": true,
        "activities": activities,
    })))
}
