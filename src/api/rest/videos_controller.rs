use crate::alerts::AlertManager;
use crate::api::rest::{ApiError, ApiResult, AppState, PageParams};
use crate::db::local_now;
use crate::db::models::{NewAlert, NewVideo, Video, VideoStatus};
use crate::db::repositories::VideosRepository;
use crate::error::Error;
use crate::processing::ProcessingResult;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use log::{error, info, warn};
use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

const DEFAULT_CAMERA_NAME: &str = "Uploaded Video";

#[derive(Debug, Serialize)]
pub struct VideoListResponse {
    pub videos: Vec<Video>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub video_id: i64,
    pub filename: String,
    pub result: ProcessingResult,
    pub message: String,
}

/// A video saved from a multipart upload
struct StoredUpload {
    filename: String,
    path: PathBuf,
    size: u64,
}

/// Create videos router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_videos))
        .route("/upload", post(upload_video))
        .route("/:id", get(get_video))
}

/// Strip directories and anything but letters, digits, `.`, `_` and `-`
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned.to_string()
    }
}

fn has_allowed_extension(name: &str, allowed: &[String]) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .map_or(false, |ext| allowed.iter().any(|a| a.eq_ignore_ascii_case(&ext)))
}

fn multipart_error(err: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("Invalid multipart upload: {}", err))
}

/// Accept a video, analyse it and raise alerts for what was found
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    let mut upload = None;
    let mut camera_id = None;
    let mut camera_name = None;

    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("video") => {
                let original = field.file_name().unwrap_or_default().to_string();
                if original.is_empty() {
                    return Err(ApiError::bad_request("No file selected"));
                }
                if !has_allowed_extension(&original, &state.storage.allowed_extensions) {
                    return Err(ApiError::bad_request(format!(
                        "Invalid file type. Allowed: {}",
                        state.storage.allowed_extensions.join(", ")
                    )));
                }

                let filename = format!(
                    "{}_{}",
                    local_now().format("%Y%m%d_%H%M%S"),
                    sanitize_filename(&original)
                );
                tokio::fs::create_dir_all(&state.storage.upload_dir)
                    .await
                    .map_err(Error::from)?;
                let path = state.storage.upload_dir.join(&filename);

                let mut file = tokio::fs::File::create(&path).await.map_err(Error::from)?;
                let mut size = 0u64;
                while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                    size += chunk.len() as u64;
                    file.write_all(&chunk).await.map_err(Error::from)?;
                }
                file.flush().await.map_err(Error::from)?;

                upload = Some(StoredUpload {
                    filename,
                    path,
                    size,
                });
            }
            Some("camera_id") => {
                let text = field.text().await.map_err(multipart_error)?;
                camera_id = text.trim().parse::<i64>().ok();
            }
            Some("camera_name") => {
                let text = field.text().await.map_err(multipart_error)?;
                camera_name = Some(text.trim().to_string()).filter(|name| !name.is_empty());
            }
            _ => {}
        }
    }

    let upload = upload.ok_or_else(|| ApiError::bad_request("No video file provided"))?;
    info!(
        "Video uploaded: {} ({:.2} MB)",
        upload.filename,
        upload.size as f64 / (1024.0 * 1024.0)
    );

    let video_id = VideosRepository::new(Arc::clone(&state.db_pool))
        .create(&NewVideo {
            filename: upload.filename.clone(),
            filepath: upload.path.to_string_lossy().to_string(),
            camera_id,
            camera_name: Some(camera_name.unwrap_or_else(|| DEFAULT_CAMERA_NAME.to_string())),
            upload_time: local_now(),
            status: VideoStatus::Processing,
        })
        .await?;

    let result = ingest_video(&state, video_id, &upload.path, camera_id).await?;

    if !result.success {
        let reason = result.error.unwrap_or_default();
        let body = json!({
            "success": false,
            "video_id": video_id,
            "error": format!("Processing failed: {}", reason),
        });
        return Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response());
    }

    Ok(Json(UploadResponse {
        success: true,
        video_id,
        filename: upload.filename,
        result,
        message: "Video processed successfully".to_string(),
    })
    .into_response())
}

/// Run processing for a registered video and store what it produced.
///
/// A failed analysis, or results that could not be stored, mark the video
/// `failed` and come back as an unsuccessful result.
pub async fn ingest_video(
    state: &AppState,
    video_id: i64,
    path: &std::path::Path,
    camera_id: Option<i64>,
) -> anyhow::Result<ProcessingResult> {
    let videos = VideosRepository::new(Arc::clone(&state.db_pool));
    let mut result = state.video_processor.process(path, video_id).await;

    if result.success {
        let alerts: Vec<NewAlert> = result
            .anomalies
            .iter()
            .map(|anomaly| AlertManager::build_alert(anomaly, Some(video_id), camera_id))
            .collect();

        let stored = match serde_json::to_value(&result) {
            Ok(payload) => {
                videos
                    .record_analysis(
                        video_id,
                        &payload,
                        result.people_count,
                        result.normal_events_count,
                        &alerts,
                    )
                    .await
            }
            Err(e) => Err(Error::from(e).into()),
        };

        match stored {
            Ok(alert_ids) => {
                for (alert_id, alert) in alert_ids.into_iter().zip(alerts) {
                    state.alert_manager.announce(alert_id, alert).await;
                }

                info!(
                    "Video {} processed: {} detections, {} anomalies",
                    video_id,
                    result.detections.len(),
                    result.anomalies.len()
                );
                return Ok(result);
            }
            Err(e) => result = ProcessingResult::failed(format!("Failed to store results: {}", e)),
        }
    }

    let reason = result.error.clone().unwrap_or_default();
    error!("Error processing video {}: {}", video_id, reason);
    if !videos
        .update_status(video_id, VideoStatus::Failed, Some(&json!({ "error": reason })))
        .await?
    {
        warn!("Video {} could not be marked failed", video_id);
    }
    Ok(result)
}

pub async fn list_videos(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<VideoListResponse>> {
    let videos = VideosRepository::new(Arc::clone(&state.db_pool))
        .list(page.limit(), page.offset())
        .await?;

    Ok(Json(VideoListResponse {
        total: videos.len(),
        videos,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Video>> {
    let video = VideosRepository::new(Arc::clone(&state.db_pool))
        .get_with_results(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {}", id)))?;

    Ok(Json(video))
}
