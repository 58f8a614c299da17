use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Detection model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Detection {
    pub id: i64,
    pub video_id: i64,
    pub timestamp: f64,
    pub object_class: String,
    pub confidence: f64,
    /// Normalized [x1, y1, x2, y2]
    pub bbox: Option<Json<Vec<f64>>>,
    pub frame_number: Option<i64>,
}

/// A single detected object instance, as produced by video processing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionRecord {
    pub frame_number: i64,
    pub timestamp: f64,
    pub object_class: String,
    pub confidence: f64,
    pub bbox: [f64; 4],
}
