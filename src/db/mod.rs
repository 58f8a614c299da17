use crate::config::DatabaseConfig;
use crate::error::Error;
use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub mod migrations;
pub mod models;
pub mod repositories;

/// Database service for handling connections and schema setup
pub struct DatabaseService {
    pub pool: Arc<SqlitePool>,
}

impl DatabaseService {
    /// Open the database described by `config`, creating the file if needed
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Initializing Database service");

        let service = Self::connect(&config.path, config.max_connections).await?;

        if config.auto_migrate {
            service.initialize().await?;
        }

        Ok(service)
    }

    /// Connect without touching the schema
    pub async fn connect(path: &Path, max_connections: u32) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(|e| Error::Database(format!("Failed to connect to database: {}", e)))?;

        info!("Connected to SQLite database at {:?}", path);

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Create the schema if absent and seed default cameras into an empty
    /// camera table. Safe to call any number of times.
    pub async fn initialize(&self) -> Result<()> {
        info!("Running database migrations");

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        migrations::run_migrations(&mut tx).await?;
        migrations::seed_default_cameras(&mut tx).await?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit migrations: {}", e)))?;

        info!("Database tables created successfully");
        Ok(())
    }

    /// Health check for database
    pub async fn health_check(&self) -> bool {
        health_check(&self.pool).await
    }
}

/// Whether the pool can still run a trivial query
pub async fn health_check(pool: &SqlitePool) -> bool {
    match sqlx::query("SELECT 1").execute(pool).await {
        Ok(_) => true,
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    }
}

/// Current local wall-clock time, truncated to whole seconds
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// Unix timestamps of local midnight on `date` and on the following day
pub fn local_day_bounds(date: NaiveDate) -> (f64, f64) {
    let start = local_midnight_timestamp(date);
    let end = date
        .succ_opt()
        .map(local_midnight_timestamp)
        .unwrap_or(start + 86_400.0);
    (start, end)
}

fn local_midnight_timestamp(date: NaiveDate) -> f64 {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp() as f64,
        // Midnight skipped by a DST change
        None => midnight.and_utc().timestamp() as f64,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// A freshly initialized database in a temporary directory
    pub async fn setup_test_db() -> (DatabaseService, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = DatabaseService::connect(&tmp.path().join("test.db"), 5)
            .await
            .unwrap();
        db.initialize().await.unwrap();
        (db, tmp)
    }

    /// Make inserts into `table` abort once it holds `limit` rows
    pub async fn fail_inserts_after(pool: &SqlitePool, table: &str, limit: usize) {
        let sql = format!(
            r#"
            CREATE TRIGGER {table}_limit BEFORE INSERT ON {table}
            WHEN (SELECT COUNT(*) FROM {table}) >= {limit}
            BEGIN
                SELECT RAISE(ABORT, '{table} is full');
            END
            "#
        );
        sqlx::query(&sql).execute(pool).await.unwrap();
    }

    pub fn new_video(filename: &str, status: models::VideoStatus) -> models::NewVideo {
        models::NewVideo {
            filename: filename.to_string(),
            filepath: format!("uploads/{}", filename),
            camera_id: Some(1),
            camera_name: Some("Main Entrance".to_string()),
            upload_time: local_now(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::setup_test_db;
    use super::*;

    #[tokio::test]
    async fn test_initialize_seeds_cameras_once() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        db.initialize().await?;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cameras")
            .fetch_one(&*db.pool)
            .await?;
        assert_eq!(count, 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (db, _tmp) = setup_test_db().await;
        assert!(db.health_check().await);

        db.pool.close().await;
        assert!(!db.health_check().await);
    }

    #[test]
    fn test_day_bounds_cover_one_local_day() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let (start, end) = local_day_bounds(date);
        assert!(end > start);
        assert!(end - start >= 23.0 * 3600.0 && end - start <= 25.0 * 3600.0);

        let noon = Local
            .from_local_datetime(&date.and_hms_opt(12, 0, 0).unwrap())
            .unwrap()
            .timestamp() as f64;
        assert!(noon >= start && noon < end);
    }
}
