use crate::api::rest::{iso_now, ApiError, ApiResult, AppState};
use crate::db::models::Camera;
use crate::db::repositories::CamerasRepository;
use axum::extract::{Path, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct CameraListResponse {
    pub cameras: Vec<Camera>,
}

#[derive(Debug, Deserialize)]
pub struct CameraStatusRequest {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub camera_id: i64,
    pub snapshot_url: String,
    pub timestamp: String,
}

/// Create cameras router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cameras))
        .route(
            "/:id/status",
            get(get_camera_status).put(update_camera_status),
        )
        .route("/:id/snapshot", get(get_camera_snapshot))
}

pub async fn get_cameras(State(state): State<AppState>) -> ApiResult<Json<CameraListResponse>> {
    let cameras = CamerasRepository::new(Arc::clone(&state.db_pool))
        .get_all()
        .await?;
    Ok(Json(CameraListResponse { cameras }))
}

pub async fn get_camera_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Camera>> {
    let camera = CamerasRepository::new(Arc::clone(&state.db_pool))
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Camera not found: {}", id)))?;

    Ok(Json(camera))
}

pub async fn update_camera_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<CameraStatusRequest>,
) -> ApiResult<Json<Camera>> {
    let status = request.status.trim().to_lowercase();
    if status.is_empty() {
        return Err(ApiError::bad_request("status must not be empty"));
    }

    let repo = CamerasRepository::new(Arc::clone(&state.db_pool));
    if !repo.update_status(id, &status).await? {
        return Err(ApiError::not_found(format!("Camera not found: {}", id)));
    }

    let camera = repo
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Camera not found: {}", id)))?;
    Ok(Json(camera))
}

/// Placeholder still image location for a camera
pub async fn get_camera_snapshot(Path(id): Path<i64>) -> Json<SnapshotResponse> {
    Json(SnapshotResponse {
        camera_id: id,
        snapshot_url: format!(
            "https://via.placeholder.com/800x450/2a2a2a/fff?text=Camera+{}",
            id
        ),
        timestamp: iso_now(),
    })
}
