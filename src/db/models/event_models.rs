use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Event model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub video_id: i64,
    pub camera_id: Option<i64>,
    pub event_type: String,
    /// Seconds since the unix epoch
    pub timestamp: f64,
    pub data: Option<Json<serde_json::Value>>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub video_id: i64,
    pub camera_id: Option<i64>,
    pub event_type: String,
    pub timestamp: f64,
    pub data: serde_json::Value,
}
