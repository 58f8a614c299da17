use crate::alerts::template::{config_for, describe};
use crate::alerts::{AnomalyEvent, DateRange};
use crate::db::models::{Alert, AlertStatus, NewAlert, Severity};
use crate::db::repositories::AlertsRepository;
use crate::messaging::{AlertNotification, Notifier};
use anyhow::Result;
use chrono::Local;
use log::{error, info, warn};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::Arc;

/// How many recent alerts statistics are computed over
const STATISTICS_WINDOW: i64 = 1000;
/// How many recent alerts the dashboard summary looks at
const SUMMARY_WINDOW: i64 = 100;
const SUMMARY_RECENT: usize = 5;

/// Alert counts over a window of recent alerts
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct AlertStatistics {
    pub total_alerts: usize,
    /// Every severity level, zero when absent
    pub by_severity: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
    pub critical_alerts: usize,
    pub resolved_alerts: usize,
}

/// Dashboard view of recent alerts
#[derive(Debug, Clone, Serialize)]
pub struct AlertSummary {
    pub total_today: usize,
    pub critical_today: usize,
    /// Alerts nobody has acted on yet
    pub unresolved: usize,
    pub recent_alerts: Vec<Alert>,
}

/// Turns anomalies into alerts and drives them through their lifecycle
pub struct AlertManager {
    alerts: AlertsRepository,
    notifier: Arc<dyn Notifier>,
}

impl AlertManager {
    pub fn new(pool: Arc<SqlitePool>, notifier: Arc<dyn Notifier>) -> Self {
        info!("Alert system initialized");
        Self {
            alerts: AlertsRepository::new(pool),
            notifier,
        }
    }

    pub fn is_active(&self) -> bool {
        true
    }

    /// Persist an alert for `anomaly` and notify if its type asks for it.
    ///
    /// Returns the new alert ID, or `None` when it could not be stored.
    pub async fn create_alert(
        &self,
        anomaly: &AnomalyEvent,
        video_id: Option<i64>,
        camera_id: Option<i64>,
    ) -> Option<i64> {
        let alert = Self::build_alert(anomaly, video_id, camera_id);

        let alert_id = match self.alerts.create(&alert).await {
            Ok(id) => id,
            Err(e) => {
                error!("Error creating alert: {}", e);
                return None;
            }
        };

        self.announce(alert_id, alert).await;
        Some(alert_id)
    }

    /// The alert row for `anomaly`: severity from the event or its type,
    /// description from the type's template
    pub fn build_alert(
        anomaly: &AnomalyEvent,
        video_id: Option<i64>,
        camera_id: Option<i64>,
    ) -> NewAlert {
        let config = config_for(&anomaly.alert_type);
        NewAlert {
            video_id,
            camera_id,
            alert_type: anomaly.alert_type.clone(),
            severity: anomaly.severity.unwrap_or(config.default_severity),
            timestamp: anomaly
                .timestamp
                .unwrap_or_else(|| Local::now().timestamp() as f64),
            description: Some(describe(config.template, &anomaly.metadata)),
            metadata: anomaly.metadata.clone(),
        }
    }

    /// Log a stored alert and notify if its type asks for it
    pub async fn announce(&self, alert_id: i64, alert: NewAlert) {
        info!(
            "Alert created: ID={}, Type={}, Severity={}",
            alert_id, alert.alert_type, alert.severity
        );

        if config_for(&alert.alert_type).notify {
            self.send(AlertNotification {
                alert_id,
                alert_type: alert.alert_type,
                severity: alert.severity,
                description: alert.description,
                camera_id: alert.camera_id,
                video_id: alert.video_id,
                timestamp: alert.timestamp,
                escalated_from: None,
            })
            .await;
        }
    }

    /// Raise an alert to a strictly higher severity.
    ///
    /// Returns false, leaving the alert untouched, when it does not exist or
    /// `new_severity` is not above its current severity.
    pub async fn escalate(&self, alert_id: i64, new_severity: Severity) -> bool {
        let alert = match self.alerts.get_by_id(alert_id).await {
            Ok(Some(alert)) => alert,
            Ok(None) => {
                error!("Alert {} not found", alert_id);
                return false;
            }
            Err(e) => {
                error!("Error escalating alert: {}", e);
                return false;
            }
        };

        let current = alert.severity;
        if new_severity.rank() <= current.rank() {
            warn!(
                "Cannot escalate alert {} from {} to same or lower severity {}",
                alert_id, current, new_severity
            );
            return false;
        }

        let notes = format!("Escalated from {} to {}", current, new_severity);
        match self
            .alerts
            .escalate(alert_id, current, new_severity, &notes)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    "Alert {} changed or disappeared before escalation to {}",
                    alert_id, new_severity
                );
                return false;
            }
            Err(e) => {
                error!("Error escalating alert: {}", e);
                return false;
            }
        }

        info!(
            "Alert {} escalated from {} to {}",
            alert_id, current, new_severity
        );

        self.send(AlertNotification {
            alert_id,
            alert_type: alert.alert_type,
            severity: new_severity,
            description: alert.description,
            camera_id: alert.camera_id,
            video_id: alert.video_id,
            timestamp: alert.timestamp,
            escalated_from: Some(current),
        })
        .await;

        true
    }

    /// Mark an alert as seen by an operator
    pub async fn acknowledge(&self, alert_id: i64, notes: &str) -> bool {
        self.set_status(alert_id, AlertStatus::Acknowledged, notes)
            .await
    }

    /// Close an alert
    pub async fn resolve(&self, alert_id: i64, notes: &str) -> bool {
        self.set_status(alert_id, AlertStatus::Resolved, notes).await
    }

    async fn set_status(&self, alert_id: i64, status: AlertStatus, notes: &str) -> bool {
        match self.alerts.update_status(alert_id, status, notes).await {
            Ok(true) => {
                info!("Alert {} {}", alert_id, status);
                true
            }
            Ok(false) => {
                warn!("Alert {} not found, cannot mark it {}", alert_id, status);
                false
            }
            Err(e) => {
                error!("Error updating alert {} to {}: {}", alert_id, status, e);
                false
            }
        }
    }

    /// Counts over the most recent alerts, optionally limited to those
    /// created within `range`
    pub async fn get_statistics(&self, range: Option<DateRange>) -> Result<AlertStatistics> {
        let alerts = self.alerts.list(None, STATISTICS_WINDOW, 0).await?;
        let alerts = alerts
            .iter()
            .filter(|a| range.map_or(true, |r| r.contains(&a.created_at)));

        let mut by_severity: BTreeMap<String, usize> = Severity::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        let mut by_type = BTreeMap::new();
        let mut total_alerts = 0;
        let mut resolved_alerts = 0;

        for alert in alerts {
            total_alerts += 1;
            *by_severity.entry(alert.severity.to_string()).or_default() += 1;
            *by_type.entry(alert.alert_type.clone()).or_default() += 1;
            if alert.status == AlertStatus::Resolved {
                resolved_alerts += 1;
            }
        }

        Ok(AlertStatistics {
            total_alerts,
            critical_alerts: by_severity[Severity::Critical.as_str()],
            by_severity,
            by_type,
            resolved_alerts,
        })
    }

    /// Today's totals and the latest few alerts
    pub async fn get_summary(&self) -> Result<AlertSummary> {
        let mut alerts = self.alerts.list(None, SUMMARY_WINDOW, 0).await?;
        let today = Local::now().date_naive();

        let (total_today, critical_today) = alerts
            .iter()
            .filter(|a| a.created_at.date() == today)
            .fold((0, 0), |(total, critical), a| {
                let is_critical = a.severity == Severity::Critical;
                (total + 1, critical + usize::from(is_critical))
            });
        let unresolved = alerts
            .iter()
            .filter(|a| a.status == AlertStatus::New)
            .count();

        alerts.truncate(SUMMARY_RECENT);

        Ok(AlertSummary {
            total_today,
            critical_today,
            unresolved,
            recent_alerts: alerts,
        })
    }

    async fn send(&self, notification: AlertNotification) {
        if let Err(e) = self.notifier.notify(&notification).await {
            warn!(
                "Failed to send notification for alert {}: {}",
                notification.alert_id, e
            );
        }
    }
}
