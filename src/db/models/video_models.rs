use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

/// Video processing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum VideoStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl VideoStatus {
    pub const ALL: [VideoStatus; 4] = [
        VideoStatus::Pending,
        VideoStatus::Processing,
        VideoStatus::Completed,
        VideoStatus::Failed,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Completed | VideoStatus::Failed)
    }

    /// Status only moves forward: pending -> processing -> completed | failed.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        match (self, next) {
            (VideoStatus::Pending, VideoStatus::Processing) => true,
            (VideoStatus::Pending | VideoStatus::Processing, s) => s.is_terminal(),
            _ => false,
        }
    }

    /// Statuses a video may currently hold for `self` to be a legal next status
    pub fn predecessors(&self) -> Vec<VideoStatus> {
        Self::ALL
            .into_iter()
            .filter(|current| current.can_transition_to(*self))
            .collect()
    }
}

impl std::fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoStatus::Pending => write!(f, "pending"),
            VideoStatus::Processing => write!(f, "processing"),
            VideoStatus::Completed => write!(f, "completed"),
            VideoStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Video model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Video {
    pub id: i64,
    pub filename: String,
    pub filepath: String,
    pub camera_id: Option<i64>,
    pub camera_name: Option<String>,
    pub upload_time: NaiveDateTime,
    pub duration: Option<f64>,
    pub fps: Option<f64>,
    pub total_frames: Option<i64>,
    pub status: VideoStatus,
    /// Processing results payload, opaque to the store
    pub results: Option<Json<serde_json::Value>>,
}

/// Values needed to register an uploaded video
#[derive(Debug, Clone)]
pub struct NewVideo {
    pub filename: String,
    pub filepath: String,
    pub camera_id: Option<i64>,
    pub camera_name: Option<String>,
    pub upload_time: NaiveDateTime,
    pub status: VideoStatus,
}
