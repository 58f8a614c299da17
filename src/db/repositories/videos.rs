use crate::db::models::{NewAlert, NewVideo, Video, VideoStatus};
use crate::db::repositories::detections::people_placeholders;
use crate::db::repositories::{AlertsRepository, DetectionsRepository, EventsRepository};
use crate::error::Error;
use anyhow::Result;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{info, warn};

/// Videos repository for handling uploaded video records
#[derive(Clone)]
pub struct VideosRepository {
    pool: Arc<SqlitePool>,
}

impl VideosRepository {
    /// Create a new videos repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Register an uploaded video, returning its ID
    pub async fn create(&self, video: &NewVideo) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO videos (filename, filepath, camera_id, camera_name, upload_time, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&video.filename)
        .bind(&video.filepath)
        .bind(video.camera_id)
        .bind(&video.camera_name)
        .bind(video.upload_time)
        .bind(video.status)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create video: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit video: {}", e)))?;

        let id = result.last_insert_rowid();
        info!("Registered video {} ({})", id, video.filename);
        Ok(id)
    }

    /// Move a video to `status`. When `results` is given, the duration, fps and
    /// frame count found in it are stored alongside the whole payload.
    ///
    /// Returns false when the video does not exist or the move would go
    /// backwards (terminal statuses never change).
    pub async fn update_status(
        &self,
        id: i64,
        status: VideoStatus,
        results: Option<&serde_json::Value>,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let updated = Self::set_status(&mut *tx, id, status, results).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit video status: {}", e)))?;

        if !updated {
            warn!(
                "Video {} not updated to {}: missing or already past that status",
                id, status
            );
            return Ok(false);
        }

        info!("Video {} is now {}", id, status);
        Ok(true)
    }

    /// Store a finished analysis: placeholder people detections and motion
    /// events, the alerts it raised and the `completed` status with its
    /// results. All of it is written in one transaction, so nothing is kept
    /// when any write fails.
    ///
    /// Returns the new alert IDs in the order of `alerts`.
    pub async fn record_analysis(
        &self,
        id: i64,
        results: &serde_json::Value,
        people_count: u32,
        motion_events: u32,
        alerts: &[NewAlert],
    ) -> Result<Vec<i64>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        if !Self::set_status(&mut *tx, id, VideoStatus::Completed, Some(results)).await? {
            return Err(Error::Validation(format!("Video {} is not awaiting results", id)).into());
        }

        DetectionsRepository::insert_all(&mut *tx, id, &people_placeholders(people_count)).await?;
        EventsRepository::insert_motion(&mut *tx, id, motion_events).await?;

        let mut alert_ids = Vec::with_capacity(alerts.len());
        for alert in alerts {
            alert_ids.push(AlertsRepository::insert(&mut *tx, alert).await?);
        }

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit analysis: {}", e)))?;

        info!(
            "Video {} is now {} with {} alerts",
            id,
            VideoStatus::Completed,
            alert_ids.len()
        );
        Ok(alert_ids)
    }

    /// Guarded status write. When `results` is given, the duration, fps and
    /// frame count found in it are stored alongside the whole payload.
    async fn set_status(
        conn: &mut SqliteConnection,
        id: i64,
        status: VideoStatus,
        results: Option<&serde_json::Value>,
    ) -> Result<bool> {
        // The guard only interpolates fixed status names
        let guard = status
            .predecessors()
            .iter()
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ");
        if guard.is_empty() {
            warn!("Refusing to move video {} back to {}", id, status);
            return Ok(false);
        }

        let result = match results {
            Some(results) => {
                let sql = format!(
                    r#"
                    UPDATE videos
                    SET status = ?, results = ?, duration = ?, fps = ?, total_frames = ?
                    WHERE id = ? AND status IN ({})
                    "#,
                    guard
                );
                sqlx::query(&sql)
                    .bind(status)
                    .bind(Json(results))
                    .bind(results.get("duration").and_then(|v| v.as_f64()))
                    .bind(results.get("fps").and_then(|v| v.as_f64()))
                    .bind(results.get("total_frames").and_then(|v| v.as_i64()))
                    .bind(id)
                    .execute(&mut *conn)
                    .await
            }
            None => {
                let sql = format!(
                    "UPDATE videos SET status = ? WHERE id = ? AND status IN ({})",
                    guard
                );
                sqlx::query(&sql)
                    .bind(status)
                    .bind(id)
                    .execute(&mut *conn)
                    .await
            }
        }
        .map_err(|e| Error::Database(format!("Failed to update video status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// List videos, most recently uploaded first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Video>> {
        let result = sqlx::query_as::<_, Video>(
            r#"
            SELECT id, filename, filepath, camera_id, camera_name, upload_time,
                   duration, fps, total_frames, status, results
            FROM videos
            ORDER BY upload_time DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list videos: {}", e)))?;

        Ok(result)
    }

    /// Get a video with its deserialized processing results
    pub async fn get_with_results(&self, id: i64) -> Result<Option<Video>> {
        let result = sqlx::query_as::<_, Video>(
            r#"
            SELECT id, filename, filepath, camera_id, camera_name, upload_time,
                   duration, fps, total_frames, status, results
            FROM videos
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get video by ID: {}", e)))?;

        Ok(result)
    }

    /// Count videos that finished processing between two dates, inclusive
    pub async fn count_completed_between(
        &self,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    ) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM videos
            WHERE status = 'completed' AND date(upload_time) BETWEEN ? AND ?
            "#,
        )
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count videos: {}", e)))?;

        Ok(count)
    }
}
