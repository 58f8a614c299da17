use crate::api::rest::{ApiError, ApiResult, AppState, PageParams};
use crate::db::local_now;
use crate::db::models::{NewReport, Report};
use crate::db::repositories::ReportsRepository;
use crate::error::Error;
use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const DEFAULT_REPORT_TYPE: &str = "daily";

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub report_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GenerateReportResponse {
    pub success: bool,
    pub report_id: i64,
    pub filename: String,
    pub download_url: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ReportListResponse {
    pub reports: Vec<Report>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

/// Create reports router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_reports))
        .route("/generate", post(generate_report))
        .route("/:id/download", get(download_report))
}

/// Accepts `YYYY-MM-DD`, a local `YYYY-MM-DDTHH:MM:SS` or an RFC 3339 timestamp
fn parse_date(field: &str, value: &str) -> Result<NaiveDate, Error> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| Error::Validation(format!("Invalid {}: {}", field, value)))
}

pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> ApiResult<Json<GenerateReportResponse>> {
    let (start, end) = match (request.start_date.as_deref(), request.end_date.as_deref()) {
        (Some(start), Some(end)) => (parse_date("start_date", start)?, parse_date("end_date", end)?),
        _ => return Err(ApiError::bad_request("start_date and end_date are required")),
    };
    let report_type = request
        .report_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_REPORT_TYPE);

    let path = state
        .report_generator
        .generate(start, end, report_type)
        .await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();

    let report_id = ReportsRepository::new(Arc::clone(&state.db_pool))
        .create(&NewReport {
            filename: filename.clone(),
            filepath: path.to_string_lossy().to_string(),
            report_type: report_type.to_string(),
            start_date: start,
            end_date: end,
            generated_at: local_now(),
        })
        .await?;

    info!("Report {} generated for {} to {}", report_id, start, end);
    Ok(Json(GenerateReportResponse {
        success: true,
        report_id,
        filename,
        download_url: format!("/api/reports/{}/download", report_id),
        message: "Report generated successfully".to_string(),
    }))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<ReportListResponse>> {
    let reports = ReportsRepository::new(Arc::clone(&state.db_pool))
        .list(page.limit(), page.offset())
        .await?;

    Ok(Json(ReportListResponse {
        total: reports.len(),
        reports,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

/// Serve a generated report as a plain text attachment
pub async fn download_report(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Response> {
    let report = ReportsRepository::new(Arc::clone(&state.db_pool))
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Report not found: {}", id)))?;

    let content = match tokio::fs::read(&report.filepath).await {
        Ok(content) => content,
        Err(e) => {
            warn!("Report file {} unavailable: {}", report.filepath, e);
            return Err(Error::NotFound(format!("report file for report {}", id)).into());
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", report.filename);
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        content,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::test_support::test_state;
    use axum::http::StatusCode;

    fn request(start: Option<&str>, end: Option<&str>, report_type: Option<&str>) -> Json<GenerateReportRequest> {
        Json(GenerateReportRequest {
            start_date: start.map(str::to_string),
            end_date: end.map(str::to_string),
            report_type: report_type.map(str::to_string),
        })
    }

    fn no_paging() -> Query<PageParams> {
        Query(PageParams {
            limit: None,
            offset: None,
        })
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(parse_date("start_date", "2024-03-09").unwrap(), expected);
        assert_eq!(parse_date("start_date", "2024-03-09T17:45:00").unwrap(), expected);
        assert_eq!(parse_date("start_date", "2024-03-09T17:45:00+02:00").unwrap(), expected);
        assert!(matches!(
            parse_date("end_date", "09/03/2024"),
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_list_and_download() {
        let (state, _tmp) = test_state().await;

        let Json(generated) = generate_report(
            State(state.clone()),
            request(Some("2024-01-01"), Some("2024-01-31"), None),
        )
        .await
        .unwrap();
        assert!(generated.success);
        assert!(generated.filename.starts_with("daily_report_"));
        assert_eq!(
            generated.download_url,
            format!("/api/reports/{}/download", generated.report_id)
        );

        let Json(listed) = list_reports(State(state.clone()), no_paging()).await.unwrap();
        assert_eq!(listed.total, 1);
        assert_eq!(listed.reports[0].report_type, "daily");
        assert_eq!(
            listed.reports[0].start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );

        let response = download_report(State(state), Path(generated.report_id))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        assert!(disposition.starts_with("attachment;"));
        assert!(disposition.contains(&generated.filename));
    }

    #[tokio::test]
    async fn test_generate_requires_valid_dates() {
        let (state, _tmp) = test_state().await;

        let err = generate_report(State(state.clone()), request(Some("2024-01-01"), None, None))
            .await
            .unwrap_err();
        assert_eq!(err.status, 400);

        let err = generate_report(
            State(state.clone()),
            request(Some("2024-02-01"), Some("2024-01-01"), Some("weekly")),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, 400);

        let err = generate_report(
            State(state.clone()),
            request(Some("yesterday"), Some("2024-01-01"), None),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, 400);

        let Json(listed) = list_reports(State(state), no_paging()).await.unwrap();
        assert_eq!(listed.total, 0);
    }

    #[tokio::test]
    async fn test_download_missing_report() {
        let (state, _tmp) = test_state().await;

        let err = download_report(State(state.clone()), Path(9)).await.unwrap_err();
        assert_eq!(err.status, 404);

        let Json(generated) = generate_report(
            State(state.clone()),
            request(Some("2024-01-01"), Some("2024-01-02"), Some("weekly")),
        )
        .await
        .unwrap();
        let report = ReportsRepository::new(state.db_pool.clone())
            .get_by_id(generated.report_id)
            .await
            .unwrap()
            .unwrap();
        std::fs::remove_file(&report.filepath).unwrap();

        let err = download_report(State(state), Path(generated.report_id))
            .await
            .unwrap_err();
        assert_eq!(err.status, 404);
    }
}
