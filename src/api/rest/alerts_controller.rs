use crate::alerts::{AlertStatistics, AlertSummary, DateRange};
use crate::api::rest::{ApiError, ApiResult, AppState, PageParams};
use crate::db::models::{Alert, Severity};
use crate::db::repositories::AlertsRepository;
use axum::extract::{Path, Query, State};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert list query parameters
#[derive(Debug, Deserialize)]
pub struct AlertListParams {
    pub severity: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub alerts: Vec<Alert>,
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct NotesRequest {
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Deserialize)]
pub struct EscalateRequest {
    pub severity: String,
}

#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

/// Create alerts router
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_alerts))
        .route("/statistics", get(get_statistics))
        .route("/summary", get(get_summary))
        .route("/:id", get(get_alert))
        .route("/:id/acknowledge", post(acknowledge_alert))
        .route("/:id/resolve", post(resolve_alert))
        .route("/:id/escalate", post(escalate_alert))
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<AlertListParams>,
) -> ApiResult<Json<AlertListResponse>> {
    let severity = params
        .severity
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<Severity>)
        .transpose()?;
    let page = PageParams {
        limit: params.limit,
        offset: params.offset,
    };

    let alerts = AlertsRepository::new(Arc::clone(&state.db_pool))
        .list(severity, page.limit(), page.offset())
        .await?;

    Ok(Json(AlertListResponse {
        total: alerts.len(),
        alerts,
        limit: page.limit(),
        offset: page.offset(),
    }))
}

async fn find_alert(state: &AppState, id: i64) -> ApiResult<Alert> {
    AlertsRepository::new(Arc::clone(&state.db_pool))
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Alert not found: {}", id)))
}

pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<Alert>> {
    Ok(Json(find_alert(&state, id).await?))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<NotesRequest>>,
) -> ApiResult<Json<ActionResponse>> {
    find_alert(&state, id).await?;
    let notes = body.map(|Json(request)| request.notes).unwrap_or_default();

    let success = state.alert_manager.acknowledge(id, &notes).await;
    Ok(Json(ActionResponse { success }))
}

pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    body: Option<Json<NotesRequest>>,
) -> ApiResult<Json<ActionResponse>> {
    find_alert(&state, id).await?;
    let notes = body.map(|Json(request)| request.notes).unwrap_or_default();

    let success = state.alert_manager.resolve(id, &notes).await;
    Ok(Json(ActionResponse { success }))
}

/// Escalate an alert. Asking for a severity that is not higher than the
/// current one answers `success: false`.
pub async fn escalate_alert(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<EscalateRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let severity: Severity = request.severity.parse()?;
    find_alert(&state, id).await?;

    info!("Escalation of alert {} to {} requested", id, severity);
    let success = state.alert_manager.escalate(id, severity).await;
    Ok(Json(ActionResponse { success }))
}

pub async fn get_statistics(
    State(state): State<AppState>,
    Query(params): Query<StatisticsParams>,
) -> ApiResult<Json<AlertStatistics>> {
    let range = match (params.start, params.end) {
        (None, None) => None,
        (start, end) => {
            let range = DateRange {
                start: start.unwrap_or(NaiveDate::MIN),
                end: end.unwrap_or(NaiveDate::MAX),
            };
            if range.start > range.end {
                return Err(ApiError::bad_request("start must not be after end"));
            }
            Some(range)
        }
    };

    Ok(Json(state.alert_manager.get_statistics(range).await?))
}

pub async fn get_summary(State(state): State<AppState>) -> ApiResult<Json<AlertSummary>> {
    Ok(Json(state.alert_manager.get_summary().await?))
}
