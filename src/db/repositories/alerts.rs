use crate::db::local_now;
use crate::db::models::{Alert, AlertStatus, NewAlert, Severity};
use crate::error::Error;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use sqlx::types::Json;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::BTreeMap;
use std::sync::Arc;

const ALERT_COLUMNS: &str = r#"
    a.id, a.video_id, a.camera_id, a.alert_type, a.severity, a.timestamp,
    a.description, a.metadata, a.status, a.notes, a.created_at, a.updated_at
"#;

/// Alerts repository for handling alert operations
#[derive(Clone)]
pub struct AlertsRepository {
    pool: Arc<SqlitePool>,
}

impl AlertsRepository {
    /// Create a new alerts repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Persist a new alert in status `new`, returning its ID
    pub async fn create(&self, alert: &NewAlert) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let id = Self::insert(&mut *tx, alert).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert: {}", e)))?;

        Ok(id)
    }

    /// Insert an alert on a connection the caller controls
    pub(crate) async fn insert(conn: &mut SqliteConnection, alert: &NewAlert) -> Result<i64> {
        let now = local_now();
        let result = sqlx::query(
            r#"
            INSERT INTO alerts (
                video_id, camera_id, alert_type, severity, timestamp, description,
                metadata, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(alert.video_id)
        .bind(alert.camera_id)
        .bind(&alert.alert_type)
        .bind(alert.severity)
        .bind(alert.timestamp)
        .bind(&alert.description)
        .bind(Json(&alert.metadata))
        .bind(AlertStatus::New)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        Ok(result.last_insert_rowid())
    }

    /// List alerts newest first, optionally restricted to one severity
    pub async fn list(
        &self,
        severity: Option<Severity>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Alert>> {
        let filter = if severity.is_some() {
            "WHERE a.severity = ?"
        } else {
            ""
        };
        let sql = format!(
            r#"
            SELECT {}, c.name AS camera_name, NULL AS video_filename
            FROM alerts a
            LEFT JOIN cameras c ON a.camera_id = c.id
            {}
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT ? OFFSET ?
            "#,
            ALERT_COLUMNS, filter
        );

        let mut query = sqlx::query_as::<_, Alert>(&sql);
        if let Some(severity) = severity {
            query = query.bind(severity);
        }

        let result = query
            .bind(limit)
            .bind(offset)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        Ok(result)
    }

    /// Get alert by ID with its camera name and video filename
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Alert>> {
        let sql = format!(
            r#"
            SELECT {}, c.name AS camera_name, v.filename AS video_filename
            FROM alerts a
            LEFT JOIN cameras c ON a.camera_id = c.id
            LEFT JOIN videos v ON a.video_id = v.id
            WHERE a.id = ?
            "#,
            ALERT_COLUMNS
        );

        let result = sqlx::query_as::<_, Alert>(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to get alert by ID: {}", e)))?;

        Ok(result)
    }

    /// Set status and notes. Transition rules are enforced by the caller.
    ///
    /// Returns false if the alert does not exist.
    pub async fn update_status(&self, id: i64, status: AlertStatus, notes: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET status = ?, notes = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(notes)
        .bind(local_now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update alert status: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit alert status: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Move an alert from severity `from` to `to` and mark it escalated.
    ///
    /// Returns false if the alert does not exist or no longer has severity
    /// `from`.
    pub async fn escalate(
        &self,
        id: i64,
        from: Severity,
        to: Severity,
        notes: &str,
    ) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE alerts
            SET severity = ?, status = ?, notes = ?, updated_at = ?
            WHERE id = ? AND severity = ?
            "#,
        )
        .bind(to)
        .bind(AlertStatus::Escalated)
        .bind(notes)
        .bind(local_now())
        .bind(id)
        .bind(from)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to escalate alert: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit escalation: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Count alerts created on the current local calendar day
    pub async fn count_today(&self) -> Result<i64> {
        self.count_created_on(Local::now().date_naive()).await
    }

    /// Count alerts created on `date`
    pub async fn count_created_on(&self, date: NaiveDate) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM alerts WHERE date(created_at) = ?",
        )
        .bind(date.format("%Y-%m-%d").to_string())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count alerts: {}", e)))?;

        Ok(count)
    }

    /// Alerts created between two dates, inclusive, per severity
    pub async fn count_by_severity_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<Severity, i64>> {
        let rows = sqlx::query_as::<_, (Severity, i64)>(
            r#"
            SELECT severity, COUNT(*) AS count
            FROM alerts
            WHERE date(created_at) BETWEEN ? AND ?
            GROUP BY severity
            "#,
        )
        .bind(start.format("%Y-%m-%d").to_string())
        .bind(end.format("%Y-%m-%d").to_string())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count alerts by severity: {}", e)))?;

        Ok(rows.into_iter().collect())
    }

    /// The latest alerts created between two dates, inclusive
    pub async fn list_created_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    ) -> Result<Vec<Alert>> {
        let sql = format!(
            r#"
            SELECT {}, c.name AS camera_name, NULL AS video_filename
            FROM alerts a
            LEFT JOIN cameras c ON a.camera_id = c.id
            WHERE date(a.created_at) BETWEEN ? AND ?
            ORDER BY a.created_at DESC, a.id DESC
            LIMIT ?
            "#,
            ALERT_COLUMNS
        );

        let result = sqlx::query_as::<_, Alert>(&sql)
            .bind(start.format("%Y-%m-%d").to_string())
            .bind(end.format("%Y-%m-%d").to_string())
            .bind(limit)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list alerts in range: {}", e)))?;

        Ok(result)
    }

    /// Alert counts per local hour of day (`"00"`..`"23"`) for event
    /// timestamps at or after `since`
    pub async fn hourly_counts(&self, since: f64) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT strftime('%H', datetime(timestamp, 'unixepoch', 'localtime')) AS hour,
                   COUNT(*) AS count
            FROM alerts
            WHERE timestamp >= ?
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .bind(since)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get hourly alerts: {}", e)))?;

        Ok(rows.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;
    use serde_json::json;

    fn new_alert(alert_type: &str, severity: Severity, camera_id: Option<i64>) -> NewAlert {
        NewAlert {
            video_id: None,
            camera_id,
            alert_type: alert_type.to_string(),
            severity,
            timestamp: 0.0,
            description: Some(format!("{} alert", alert_type)),
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_metadata_round_trip() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        let mut alert = new_alert("abandoned_object", Severity::High, Some(5));
        let metadata = json!({
            "object_type": "backpack",
            "zone": {"x": 0.25, "y": [1, 2, 3]},
            "confirmed": false,
            "note": null
        });
        alert.metadata = metadata.as_object().unwrap().clone();

        let id = repo.create(&alert).await?;
        let stored = repo.get_by_id(id).await?.unwrap();

        assert_eq!(serde_json::Value::Object(stored.metadata()), metadata);
        assert_eq!(stored.camera_name.as_deref(), Some("Lobby"));
        assert_eq!(stored.video_filename, None);
        assert_eq!(stored.status, AlertStatus::New);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_references_do_not_break_reads() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        let mut alert = new_alert("intrusion", Severity::Critical, Some(404));
        alert.video_id = Some(77);
        let id = repo.create(&alert).await?;

        let stored = repo.get_by_id(id).await?.unwrap();
        assert_eq!(stored.camera_name, None);
        assert_eq!(stored.video_filename, None);
        assert_eq!(repo.list(None, 10, 0).await?.len(), 1);
        assert!(repo.get_by_id(id + 1).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_by_severity() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        repo.create(&new_alert("loitering", Severity::Low, None))
            .await?;
        let second = repo
            .create(&new_alert("intrusion", Severity::Critical, Some(1)))
            .await?;
        repo.create(&new_alert("restricted_area", Severity::High, None))
            .await?;

        let all = repo.list(None, 50, 0).await?;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].alert_type, "restricted_area");

        let critical = repo.list(Some(Severity::Critical), 50, 0).await?;
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].id, second);
        assert_eq!(critical[0].camera_name.as_deref(), Some("Main Entrance"));

        assert_eq!(repo.list(None, 1, 2).await?[0].alert_type, "loitering");
        Ok(())
    }

    #[tokio::test]
    async fn test_count_today_ignores_event_timestamp() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());
        assert_eq!(repo.count_today().await?, 0);

        // Event time far in the past, created now
        repo.create(&new_alert("loitering", Severity::Low, None))
            .await?;
        assert_eq!(repo.count_today().await?, 1);

        let mut future = new_alert("intrusion", Severity::Critical, None);
        future.timestamp = 4_000_000_000.0;
        repo.create(&future).await?;
        assert_eq!(repo.count_today().await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_status_and_escalate() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        let id = repo
            .create(&new_alert("loitering", Severity::Medium, None))
            .await?;
        assert!(
            repo.update_status(id, AlertStatus::Acknowledged, "seen")
                .await?
        );
        assert!(!repo.update_status(id + 10, AlertStatus::Resolved, "").await?);

        let stored = repo.get_by_id(id).await?.unwrap();
        assert_eq!(stored.status, AlertStatus::Acknowledged);
        assert_eq!(stored.notes.as_deref(), Some("seen"));

        assert!(
            repo.escalate(id, Severity::Medium, Severity::High, "up")
                .await?
        );
        let stored = repo.get_by_id(id).await?.unwrap();
        assert_eq!(stored.severity, Severity::High);
        assert_eq!(stored.status, AlertStatus::Escalated);

        // Stale read of the old severity
        assert!(
            !repo
                .escalate(id, Severity::Medium, Severity::Low, "down")
                .await?
        );
        let stored = repo.get_by_id(id).await?.unwrap();
        assert_eq!(stored.severity, Severity::High);
        assert_eq!(stored.notes.as_deref(), Some("up"));
        Ok(())
    }

    #[tokio::test]
    async fn test_range_queries() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        for severity in [Severity::High, Severity::High, Severity::Low] {
            repo.create(&new_alert("abandoned_object", severity, Some(2)))
                .await?;
        }

        let today = Local::now().date_naive();
        let counts = repo.count_by_severity_between(today, today).await?;
        assert_eq!(counts.get(&Severity::High), Some(&2));
        assert_eq!(counts.get(&Severity::Low), Some(&1));
        assert_eq!(counts.get(&Severity::Critical), None);

        let listed = repo.list_created_between(today, today, 2).await?;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].camera_name.as_deref(), Some("Parking Lot"));

        let last_week = today - chrono::Duration::days(7);
        assert!(repo
            .list_created_between(last_week, last_week, 10)
            .await?
            .is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_hourly_counts_use_event_time() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = AlertsRepository::new(db.pool.clone());

        let now = Local::now().timestamp() as f64;
        let mut recent = new_alert("intrusion", Severity::Critical, None);
        recent.timestamp = now;
        repo.create(&recent).await?;
        // Timestamp 0 falls outside the window
        repo.create(&new_alert("loitering", Severity::Low, None))
            .await?;

        let hourly = repo.hourly_counts(now - 3600.0).await?;
        assert_eq!(hourly.values().sum::<i64>(), 1);
        let hour = Local::now().format("%H").to_string();
        assert_eq!(hourly.get(&hour), Some(&1));
        Ok(())
    }
}
