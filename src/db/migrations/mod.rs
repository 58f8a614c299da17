use anyhow::Result;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::db::local_now;
use crate::db::models::camera_models::DEFAULT_CAMERAS;
use crate::error::Error;

/// Schema scripts, applied in order. Every statement must be idempotent.
const MIGRATIONS: &[(&str, &str)] = &[(
    "001_initial_schema.sql",
    include_str!("sql/001_initial_schema.sql"),
)];

/// Create every table and index that does not exist yet
pub async fn run_migrations(conn: &mut SqliteConnection) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        sqlx::raw_sql(sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| Error::Database(format!("Failed to apply migration {}: {}", name, e)))?;
        debug!("Applied migration: {}", name);
    }

    Ok(())
}

/// Insert the default cameras if the camera table is empty.
///
/// Returns the number of cameras inserted.
pub async fn seed_default_cameras(conn: &mut SqliteConnection) -> Result<usize> {
    let camera_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cameras")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to count cameras: {}", e)))?;

    if camera_count > 0 {
        return Ok(0);
    }

    let now = local_now();
    for (name, location, status, ip_address) in DEFAULT_CAMERAS {
        sqlx::query(
            r#"
            INSERT INTO cameras (name, location, status, ip_address, created_at, last_active)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(name)
        .bind(location)
        .bind(status)
        .bind(ip_address)
        .bind(now)
        .bind(now)
        .execute(&mut *conn)
        .await
        .map_err(|e| Error::Database(format!("Failed to seed camera {}: {}", name, e)))?;
    }

    info!("Initialized {} default cameras", DEFAULT_CAMERAS.len());
    Ok(DEFAULT_CAMERAS.len())
}
