use crate::db::models::NewEvent;
use crate::db::{local_day_bounds, local_now};
use crate::error::Error;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use serde_json::json;
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Event type written for backfilled routine activity
pub const MOTION_EVENT: &str = "motion";

/// Events repository for handling event operations
#[derive(Clone)]
pub struct EventsRepository {
    pool: Arc<SqlitePool>,
}

impl EventsRepository {
    /// Create a new events repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new event
    pub async fn create(&self, event: &NewEvent) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO events (video_id, camera_id, event_type, timestamp, data, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.video_id)
        .bind(event.camera_id)
        .bind(&event.event_type)
        .bind(event.timestamp)
        .bind(Json(&event.data))
        .bind(local_now())
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create event: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit event: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    /// Insert `count` placeholder motion events for a video.
    ///
    /// Processing only reports how many routine events it saw, so each row
    /// carries the current time and a fixed payload.
    pub async fn backfill_motion(&self, video_id: i64, count: u32) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        Self::insert_motion(&mut *tx, video_id, count).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit motion events: {}", e)))?;

        debug!("Backfilled {} motion events for video {}", count, video_id);
        Ok(())
    }

    /// Insert placeholder motion events on a connection the caller controls
    pub(crate) async fn insert_motion(
        conn: &mut SqliteConnection,
        video_id: i64,
        count: u32,
    ) -> Result<()> {
        let now = local_now();
        let timestamp = Local::now().timestamp() as f64;
        let data = json!({"intensity": 0.5});

        for _ in 0..count {
            sqlx::query(
                r#"
                INSERT INTO events (video_id, event_type, timestamp, data, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(video_id)
            .bind(MOTION_EVENT)
            .bind(timestamp)
            .bind(Json(&data))
            .bind(now)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to backfill motion events: {}", e)))?;
        }

        Ok(())
    }

    /// Count events whose timestamp falls on the local calendar day `date`
    pub async fn count_on(&self, date: NaiveDate, event_type: Option<&str>) -> Result<i64> {
        let (start, end) = local_day_bounds(date);

        let count = match event_type {
            Some(event_type) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    SELECT COUNT(*) FROM events
                    WHERE timestamp >= ? AND timestamp < ? AND event_type = ?
                    "#,
                )
                .bind(start)
                .bind(end)
                .bind(event_type)
                .fetch_one(&*self.pool)
                .await
            }
            None => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT COUNT(*) FROM events WHERE timestamp >= ? AND timestamp < ?",
                )
                .bind(start)
                .bind(end)
                .fetch_one(&*self.pool)
                .await
            }
        }
        .map_err(|e| Error::Database(format!("Failed to count events: {}", e)))?;

        Ok(count)
    }

    /// Events per type for those recorded on `date`
    pub async fn distribution_on(&self, date: NaiveDate) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT event_type, COUNT(*) AS count
            FROM events
            WHERE date(created_at) = ?
            GROUP BY event_type
            "#,
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get event distribution: {}", e)))?;

        Ok(rows.into_iter().collect())
    }

    /// Motion events per local hour of day for timestamps at or after `since`
    pub async fn hourly_motion(&self, since: f64) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT strftime('%H', datetime(timestamp, 'unixepoch', 'localtime')) AS hour,
                   COUNT(*) AS count
            FROM events
            WHERE timestamp >= ? AND event_type = ?
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .bind(since)
        .bind(MOTION_EVENT)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get hourly motion: {}", e)))?;

        Ok(rows.into_iter().collect())
    }
}
