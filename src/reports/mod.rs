use crate::db::models::{Alert, Severity};
use crate::db::repositories::{
    AlertsRepository, CamerasRepository, DetectionsRepository, VideosRepository,
};
use crate::error::Error;
use anyhow::Result;
use chrono::{Local, NaiveDate};
use log::info;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::PathBuf;
use std::sync::Arc;

/// Alerts listed individually in a report
const ALERT_BREAKDOWN_LIMIT: i64 = 10;

/// Figures shown in a report's executive summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportSummary {
    pub alerts_by_severity: BTreeMap<Severity, i64>,
    pub active_cameras: i64,
    pub total_cameras: usize,
    pub people_detected: i64,
    pub videos_processed: i64,
}

impl ReportSummary {
    pub fn total_alerts(&self) -> i64 {
        self.alerts_by_severity.values().sum()
    }

    pub fn alerts_of(&self, severity: Severity) -> i64 {
        self.alerts_by_severity
            .get(&severity)
            .copied()
            .unwrap_or_default()
    }
}

/// Writes plain-text security reports for a period
pub struct ReportGenerator {
    output_dir: PathBuf,
    alerts: AlertsRepository,
    cameras: CamerasRepository,
    detections: DetectionsRepository,
    videos: VideosRepository,
}

impl ReportGenerator {
    pub fn new(pool: Arc<SqlitePool>, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        info!(
            "Report generator initialized. Output directory: {:?}",
            output_dir
        );
        Self {
            output_dir,
            alerts: AlertsRepository::new(pool.clone()),
            cameras: CamerasRepository::new(pool.clone()),
            detections: DetectionsRepository::new(pool.clone()),
            videos: VideosRepository::new(pool),
        }
    }

    /// Write a `{type}_report_{timestamp}.txt` covering `start`..=`end` and
    /// return its path
    pub async fn generate(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        report_type: &str,
    ) -> Result<PathBuf> {
        if start > end {
            return Err(Error::Validation(format!(
                "start_date {} is after end_date {}",
                start, end
            ))
            .into());
        }
        if !is_valid_report_type(report_type) {
            return Err(Error::Validation(format!("Invalid report type: {}", report_type)).into());
        }

        let summary = self.summarize(start, end).await?;
        let alerts = self
            .alerts
            .list_created_between(start, end, ALERT_BREAKDOWN_LIMIT)
            .await?;

        let generated = Local::now();
        let filename = format!(
            "{}_report_{}.txt",
            report_type,
            generated.format("%Y%m%d_%H%M%S")
        );
        let path = self.output_dir.join(filename);

        let content = render(
            report_type,
            start,
            end,
            &generated.format("%Y-%m-%d %H:%M:%S").to_string(),
            &summary,
            &alerts,
        );

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(Error::from)?;
        tokio::fs::write(&path, content)
            .await
            .map_err(Error::from)?;

        info!("Report generated: {:?}", path);
        Ok(path)
    }

    /// Compute the executive summary figures for a period
    pub async fn summarize(&self, start: NaiveDate, end: NaiveDate) -> Result<ReportSummary> {
        Ok(ReportSummary {
            alerts_by_severity: self.alerts.count_by_severity_between(start, end).await?,
            active_cameras: self.cameras.count_active().await?,
            total_cameras: self.cameras.get_all().await?.len(),
            people_detected: self.detections.count_people_between(start, end).await?,
            videos_processed: self.videos.count_completed_between(start, end).await?,
        })
    }
}

/// Report types become part of a file name
fn is_valid_report_type(report_type: &str) -> bool {
    (1..=32).contains(&report_type.len())
        && report_type
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn title_case(report_type: &str) -> String {
    report_type
        .split(|c: char| c == '_' || c == '-')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn recommendations(summary: &ReportSummary) -> Vec<String> {
    let mut recommendations = Vec::new();

    let critical = summary.alerts_of(Severity::Critical);
    if critical > 0 {
        recommendations.push(format!(
            "Review the {} critical alert(s) and confirm each has been handled",
            critical
        ));
    }

    let offline = summary.total_cameras as i64 - summary.active_cameras;
    if offline > 0 {
        recommendations.push(format!(
            "Schedule maintenance for {} offline camera(s)",
            offline
        ));
    }

    if summary.alerts_of(Severity::High) > summary.alerts_of(Severity::Low) {
        recommendations.push(
            "Increase patrol frequency around cameras raising high severity alerts".to_string(),
        );
    }

    if summary.videos_processed == 0 {
        recommendations.push("Upload footage for this period to enable analysis".to_string());
    }

    recommendations.push("Review camera coverage for blind spots".to_string());
    recommendations
}

fn render(
    report_type: &str,
    start: NaiveDate,
    end: NaiveDate,
    generated: &str,
    summary: &ReportSummary,
    alerts: &[Alert],
) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "SECURITY ANALYTICS REPORT");
    let _ = writeln!(out, "=========================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Report Type: {}", title_case(report_type));
    let _ = writeln!(out, "Period: {} to {}", start, end);
    let _ = writeln!(out, "Generated: {}", generated);
    let _ = writeln!(out);

    let _ = writeln!(out, "EXECUTIVE SUMMARY");
    let _ = writeln!(out, "-----------------");
    let _ = writeln!(out, "- Total Alerts: {}", summary.total_alerts());
    for severity in Severity::ALL.iter().rev() {
        let _ = writeln!(
            out,
            "  - {}: {}",
            title_case(severity.as_str()),
            summary.alerts_of(*severity)
        );
    }
    let _ = writeln!(
        out,
        "- Active Monitoring Cameras: {} of {}",
        summary.active_cameras, summary.total_cameras
    );
    let _ = writeln!(out, "- People Detected: {}", summary.people_detected);
    let _ = writeln!(out, "- Videos Processed: {}", summary.videos_processed);
    let _ = writeln!(out);

    let _ = writeln!(out, "ALERT BREAKDOWN");
    let _ = writeln!(out, "---------------");
    if alerts.is_empty() {
        let _ = writeln!(out, "No alerts in this period");
    }
    for alert in alerts {
        let _ = writeln!(
            out,
            "{} - {} ({}) - {} - {}",
            alert.created_at.format("%Y-%m-%d %H:%M"),
            title_case(&alert.alert_type),
            title_case(alert.severity.as_str()),
            alert.camera_name.as_deref().unwrap_or("Unknown camera"),
            alert.status.to_string().to_uppercase()
        );
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "RECOMMENDATIONS");
    let _ = writeln!(out, "---------------");
    for (i, recommendation) in recommendations(summary).iter().enumerate() {
        let _ = writeln!(out, "{}. {}", i + 1, recommendation);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::NewAlert;
    use crate::db::test_support::setup_test_db;

    fn critical_alert() -> NewAlert {
        NewAlert {
            video_id: None,
            camera_id: Some(4),
            alert_type: "suspicious_object".to_string(),
            severity: Severity::Critical,
            timestamp: 0.0,
            description: None,
            metadata: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_generate_writes_summary() -> Result<()> {
        let (db, tmp) = setup_test_db().await;
        let generator = ReportGenerator::new(db.pool.clone(), tmp.path().join("reports"));
        AlertsRepository::new(db.pool.clone())
            .create(&critical_alert())
            .await?;
        CamerasRepository::new(db.pool.clone())
            .update_status(8, "offline")
            .await?;

        let today = Local::now().date_naive();
        let path = generator
            .generate(today - chrono::Duration::days(1), today, "daily")
            .await?;

        let filename = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(filename.starts_with("daily_report_"));
        assert!(filename.ends_with(".txt"));

        let content = std::fs::read_to_string(&path)?;
        assert!(content.contains("Report Type: Daily"));
        assert!(content.contains("- Total Alerts: 1"));
        assert!(content.contains("  - Critical: 1"));
        assert!(content.contains("Active Monitoring Cameras: 7 of 8"));
        assert!(content.contains("Suspicious Object (Critical) - Rear Exit - NEW"));
        assert!(content.contains("Schedule maintenance for 1 offline camera(s)"));
        Ok(())
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let (db, tmp) = setup_test_db().await;
        let generator = ReportGenerator::new(db.pool.clone(), tmp.path());

        let today = Local::now().date_naive();
        let err = generator
            .generate(today, today - chrono::Duration::days(1), "daily")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_report_type_cannot_escape_directory() {
        let (db, tmp) = setup_test_db().await;
        let generator = ReportGenerator::new(db.pool.clone(), tmp.path());

        let today = Local::now().date_naive();
        assert!(generator
            .generate(today, today, "../weekly")
            .await
            .is_err());
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("crowd_formation"), "Crowd Formation");
        assert_eq!(title_case("weekly"), "Weekly");
        assert_eq!(title_case("critical"), "Critical");
    }
}
