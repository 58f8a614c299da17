use crate::db::models::{NewReport, Report};
use crate::error::Error;
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Reports repository for generated report metadata
#[derive(Clone)]
pub struct ReportsRepository {
    pool: Arc<SqlitePool>,
}

impl ReportsRepository {
    /// Create a new reports repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Record a generated report, returning its ID
    pub async fn create(&self, report: &NewReport) -> Result<i64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO reports (filename, filepath, report_type, start_date, end_date, generated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.filename)
        .bind(&report.filepath)
        .bind(&report.report_type)
        .bind(report.start_date)
        .bind(report.end_date)
        .bind(report.generated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to create report: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit report: {}", e)))?;

        let id = result.last_insert_rowid();
        info!("Recorded report {} ({})", id, report.filename);
        Ok(id)
    }

    /// List reports, most recently generated first
    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Report>> {
        let result = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, filename, filepath, report_type, start_date, end_date, generated_at
            FROM reports
            ORDER BY generated_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list reports: {}", e)))?;

        Ok(result)
    }

    /// Get report by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Report>> {
        let result = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, filename, filepath, report_type, start_date, end_date, generated_at
            FROM reports
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get report by ID: {}", e)))?;

        Ok(result)
    }
}
