pub mod manager;
pub mod template;

pub use manager::{AlertManager, AlertStatistics, AlertSummary};
pub use template::{config_for, describe, AlertTypeConfig};

use crate::db::models::Severity;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An irregular condition found during processing, not yet an alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnomalyEvent {
    #[serde(rename = "type")]
    pub alert_type: String,
    /// Overrides the type's default severity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Seconds since the unix epoch; creation time is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl AnomalyEvent {
    pub fn new(alert_type: impl Into<String>) -> Self {
        Self {
            alert_type: alert_type.into(),
            severity: None,
            description: None,
            metadata: Map::new(),
            timestamp: None,
        }
    }
}

/// Inclusive range of local calendar days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, at: &NaiveDateTime) -> bool {
        let day = at.date();
        day >= self.start && day <= self.end
    }
}
