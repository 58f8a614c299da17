use crate::{
    db::{local_now, models::Camera},
    error::Error,
};
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::info;

/// Cameras repository for handling camera operations
#[derive(Clone)]
pub struct CamerasRepository {
    pool: Arc<SqlitePool>,
}

impl CamerasRepository {
    /// Create a new cameras repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Get all cameras
    pub async fn get_all(&self) -> Result<Vec<Camera>> {
        let result = sqlx::query_as::<_, Camera>(
            r#"
            SELECT id, name, location, status, ip_address, created_at, last_active
            FROM cameras
            ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get all cameras: {}", e)))?;

        Ok(result)
    }

    /// Get camera by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<Camera>> {
        let result = sqlx::query_as::<_, Camera>(
            r#"
            SELECT id, name, location, status, ip_address, created_at, last_active
            FROM cameras
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get camera by ID: {}", e)))?;

        Ok(result)
    }

    /// Count cameras currently online
    pub async fn count_active(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM cameras WHERE status = 'online'",
        )
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count active cameras: {}", e)))?;

        Ok(count)
    }

    /// Update camera status and mark it as seen now.
    ///
    /// Returns false if the camera does not exist.
    pub async fn update_status(&self, id: i64, status: &str) -> Result<bool> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin transaction: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE cameras
            SET status = ?, last_active = ?
            WHERE id = ?
            "#,
        )
        .bind(status)
        .bind(local_now())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to update camera status: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit camera status: {}", e)))?;

        if result.rows_affected() > 0 {
            info!("Camera {} is now {}", id, status);
        }
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::setup_test_db;

    #[tokio::test]
    async fn test_default_cameras() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = CamerasRepository::new(db.pool.clone());

        let cameras = repo.get_all().await?;
        assert_eq!(cameras.len(), 8);
        assert_eq!(cameras[0].name, "Main Entrance");
        assert_eq!(cameras[7].ip_address.as_deref(), Some("192.168.1.108"));
        assert_eq!(repo.count_active().await?, 8);
        Ok(())
    }

    #[tokio::test]
    async fn test_camera_status() -> Result<()> {
        let (db, _tmp) = setup_test_db().await;
        let repo = CamerasRepository::new(db.pool.clone());

        assert!(repo.update_status(2, "offline").await?);
        assert!(!repo.update_status(999, "offline").await?);

        let camera = repo.get_by_id(2).await?.unwrap();
        assert_eq!(camera.status, "offline");
        assert_eq!(repo.count_active().await?, 7);
        assert!(repo.get_by_id(999).await?.is_none());
        Ok(())
    }
}
