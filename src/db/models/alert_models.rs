use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use std::str::FromStr;

use crate::error::Error;

/// Alert severity, ordered low < medium < high < critical
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Position in the escalation order, starting at 1 for `Low`
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(Error::Validation(format!("Unknown severity: {}", s))),
        }
    }
}

/// Alert lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum AlertStatus {
    New,
    Acknowledged,
    Escalated,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::New => write!(f, "new"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Escalated => write!(f, "escalated"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

/// Alert model, joined with the camera name and video filename when available
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Alert {
    pub id: i64,
    pub video_id: Option<i64>,
    pub camera_id: Option<i64>,
    pub alert_type: String,
    pub severity: Severity,
    /// Event time in seconds since the unix epoch
    pub timestamp: f64,
    pub description: Option<String>,
    pub metadata: Option<Json<serde_json::Map<String, serde_json::Value>>>,
    pub status: AlertStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub camera_name: Option<String>,
    pub video_filename: Option<String>,
}

impl Alert {
    pub fn metadata(&self) -> serde_json::Map<String, serde_json::Value> {
        self.metadata
            .as_ref()
            .map(|m| m.0.clone())
            .unwrap_or_default()
    }
}

/// Values needed to persist a new alert
#[derive(Debug, Clone, Serialize)]
pub struct NewAlert {
    pub video_id: Option<i64>,
    pub camera_id: Option<i64>,
    pub alert_type: String,
    pub severity: Severity,
    pub timestamp: f64,
    pub description: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order_matches_rank() {
        for a in Severity::ALL {
            for b in Severity::ALL {
                assert_eq!(a < b, a.rank() < b.rank());
            }
        }
        assert_eq!(Severity::Critical.rank(), 4);
    }

    #[test]
    fn test_severity_parse() {
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("urgent".parse::<Severity>().is_err());
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }
}
