use crate::db::models::{Detection, DetectionRecord};
use crate::error::Error;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::debug;

const PERSON: &str = "person";

/// Detections repository for handling object detection rows
#[derive(Clone)]
pub struct DetectionsRepository {
    pool: Arc<SqlitePool>,
}

impl DetectionsRepository {
    /// Create a new detections repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Store the detections found in a video in a single transaction
    pub async fn insert_many(&self, video_id: i64, detections: &[DetectionRecord]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        Self::insert_all(&mut *tx, video_id, detections).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit detections: {}", e)))?;

        debug!("Stored {} detections for video {}", detections.len(), video_id);
        Ok(())
    }

    /// Insert detections on a connection the caller controls
    pub(crate) async fn insert_all(
        conn: &mut SqliteConnection,
        video_id: i64,
        detections: &[DetectionRecord],
    ) -> Result<()> {
        for detection in detections {
            sqlx::query(
                r#"
                INSERT INTO detections (video_id, timestamp, object_class, confidence, bbox, frame_number)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(video_id)
            .bind(detection.timestamp)
            .bind(&detection.object_class)
            .bind(detection.confidence)
            .bind(Json(detection.bbox.to_vec()))
            .bind(detection.frame_number)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to insert detection: {}", e)))?;
        }

        Ok(())
    }

    /// Insert `count` placeholder person detections for a video
    pub async fn backfill_people(&self, video_id: i64, count: u32) -> Result<()> {
        self.insert_many(video_id, &people_placeholders(count)).await
    }

    /// Get all detections of a video in frame order
    pub async fn get_by_video(&self, video_id: i64) -> Result<Vec<Detection>> {
        let result = sqlx::query_as::<_, Detection>(
            r#"
            SELECT id, video_id, timestamp, object_class, confidence, bbox, frame_number
            FROM detections
            WHERE video_id = ?
            ORDER BY frame_number, id
            "#,
        )
        .bind(video_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get detections: {}", e)))?;

        Ok(result)
    }

    /// Count person detections belonging to videos uploaded on `date`
    pub async fn count_people_on(&self, date: NaiveDate) -> Result<i64> {
        self.count_people_between(date, date).await
    }

    /// Count person detections for videos uploaded between two dates, inclusive
    pub async fn count_people_between(&self, start: NaiveDate, end: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM detections d
            JOIN videos v ON d.video_id = v.id
            WHERE d.object_class = ? AND date(v.upload_time) BETWEEN ? AND ?
            "#,
        )
        .bind(PERSON)
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count people: {}", e)))?;

        Ok(count)
    }
}

/// Person detections standing in for a bare people count
pub(crate) fn people_placeholders(count: u32) -> Vec<DetectionRecord> {
    let timestamp = Local::now().timestamp() as f64;
    (0..count)
        .map(|_| DetectionRecord {
            frame_number: 1,
            timestamp,
            object_class: PERSON.to_string(),
            confidence: 0.85,
            bbox: [0.0, 0.0, 1.0, 1.0],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::local_now;
    use crate::db::models::VideoStatus;
    use crate::db::repositories::VideosRepository;
    use crate::db::test_support::{fail_inserts_after, new_video, setup_test_db};

    #[tokio::test]
    async fn test_backfill_people_counts_today() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let videos = VideosRepository::new(db.pool.clone());
        let repo = DetectionsRepository::new(db.pool.clone());

        let video_id = videos.create(&new_video("hall.mp4", VideoStatus::Pending)).await?;
        repo.backfill_people(video_id, 5).await?;

        let today = Local::now().date_naive();
        assert!(repo.count_people_on(today).await? >= 5);

        let rows = repo.get_by_video(video_id).await?;
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].confidence, 0.85);
        assert_eq!(rows[0].frame_number, Some(1));
        assert_eq!(rows[0].bbox.as_ref().map(|b| b.0.clone()), Some(vec![0.0, 0.0, 1.0, 1.0]));
        Ok(())
    }

    #[tokio::test]
    async fn test_people_count_follows_upload_date() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let videos = VideosRepository::new(db.pool.clone());
        let repo = DetectionsRepository::new(db.pool.clone());

        let mut old = new_video("old.mp4", VideoStatus::Pending);
        old.upload_time = local_now() - chrono::Duration::days(3);
        let old_id = videos.create(&old).await?;

        repo.insert_many(
            old_id,
            &[
                DetectionRecord {
                    frame_number: 4,
                    timestamp: 0.13,
                    object_class: "person".to_string(),
                    confidence: 0.7,
                    bbox: [0.1, 0.2, 0.3, 0.4],
                },
                DetectionRecord {
                    frame_number: 2,
                    timestamp: 0.07,
                    object_class: "car".to_string(),
                    confidence: 0.9,
                    bbox: [0.5, 0.5, 0.9, 0.9],
                },
            ],
        )
        .await?;

        let today = Local::now().date_naive();
        assert_eq!(repo.count_people_on(today).await?, 0);
        let three_days_ago = today - chrono::Duration::days(3);
        assert_eq!(repo.count_people_on(three_days_ago).await?, 1);
        assert_eq!(repo.count_people_between(three_days_ago, today).await?, 1);

        let rows = repo.get_by_video(old_id).await?;
        assert_eq!(rows[0].object_class, "car");
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_batch_stores_nothing() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let videos = VideosRepository::new(db.pool.clone());
        let repo = DetectionsRepository::new(db.pool.clone());
        let video_id = videos.create(&new_video("gate.mp4", VideoStatus::Pending)).await?;

        fail_inserts_after(&db.pool, "detections", 3).await;

        let err = repo.backfill_people(video_id, 5).await.unwrap_err();
        assert!(err.to_string().contains("detections is full"), "{}", err);
        assert!(repo.get_by_video(video_id).await?.is_empty());

        repo.backfill_people(video_id, 3).await?;
        assert_eq!(repo.get_by_video(video_id).await?.len(), 3);
        Ok(())
    }
}
