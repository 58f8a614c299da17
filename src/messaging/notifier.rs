use crate::db::models::Severity;
use crate::messaging::event::EventType;
use anyhow::Result;
use async_trait::async_trait;
use log::{info, warn};
use serde::{Deserialize, Serialize};

/// What operators are told about a new or escalated alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertNotification {
    pub alert_id: i64,
    pub alert_type: String,
    pub severity: Severity,
    pub description: Option<String>,
    pub camera_id: Option<i64>,
    pub video_id: Option<i64>,
    /// Event time, seconds since the unix epoch
    pub timestamp: f64,
    /// Previous severity when this notification announces an escalation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub escalated_from: Option<Severity>,
}

impl AlertNotification {
    pub fn is_escalation(&self) -> bool {
        self.escalated_from.is_some()
    }

    pub fn event_type(&self) -> EventType {
        if self.is_escalation() {
            EventType::AlertEscalated
        } else {
            EventType::AlertCreated
        }
    }
}

/// Delivers alert notifications somewhere outside the process
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single notification. Failures are reported, never retried.
    async fn notify(&self, notification: &AlertNotification) -> Result<()>;
}

/// Notifier that only writes to the application log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &AlertNotification) -> Result<()> {
        if let Some(previous) = notification.escalated_from {
            warn!(
                "URGENT: alert {} ({}) escalated from {} to {}",
                notification.alert_id, notification.alert_type, previous, notification.severity
            );
        } else {
            info!(
                "Notification sent for alert: {} - {}",
                notification.alert_type, notification.severity
            );
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every notification it is given
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub sent: Mutex<Vec<AlertNotification>>,
    }

    impl RecordingNotifier {
        pub fn sent(&self) -> Vec<AlertNotification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &AlertNotification) -> Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    /// Rejects every notification
    pub struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: &AlertNotification) -> Result<()> {
            Err(crate::error::Error::Service("notification channel down".to_string()).into())
        }
    }
}
