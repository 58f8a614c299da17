use crate::api::rest::{iso_now, ApiResult, AppState};
use crate::db::repositories::events::MOTION_EVENT;
use crate::db::repositories::{
    AlertsRepository, CamerasRepository, DetectionsRepository, EventsRepository,
};
use axum::extract::{Query, State};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const HEATMAP_POINTS: usize = 15;

/// Headline numbers for the dashboard
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub active_cameras: i64,
    /// Routine motion events today
    pub normal_events: i64,
    /// Alerts created today
    pub anomalies: i64,
    pub people_detected: i64,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub struct ActivityParams {
    pub hours: Option<u32>,
}

/// Per-hour activity, one entry per hour of the day
#[derive(Debug, Serialize)]
pub struct ActivityResponse {
    pub hours: Vec<String>,
    pub motion_events: Vec<i64>,
    pub anomalies: Vec<i64>,
}

/// A hot spot in normalized frame coordinates
#[derive(Debug, Clone, Serialize)]
pub struct HeatmapPoint {
    pub x: f64,
    pub y: f64,
    pub intensity: f64,
    pub radius: u32,
}

#[derive(Debug, Serialize)]
pub struct HeatmapResponse {
    pub points: Vec<HeatmapPoint>,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct EventDistributionResponse {
    pub labels: Vec<String>,
    pub counts: Vec<i64>,
}

/// Create dashboard router
pub fn create_router() -> Router<AppState> {
    Router::new().route("/stats", get(get_dashboard_stats))
}

/// Create analytics router
pub fn create_analytics_router() -> Router<AppState> {
    Router::new()
        .route("/activity", get(get_activity))
        .route("/events", get(get_event_distribution))
        .route("/heatmap", get(get_heatmap))
}

pub async fn get_dashboard_stats(State(state): State<AppState>) -> ApiResult<Json<DashboardStats>> {
    let pool = Arc::clone(&state.db_pool);
    let today = Local::now().date_naive();

    let stats = DashboardStats {
        active_cameras: CamerasRepository::new(pool.clone()).count_active().await?,
        normal_events: EventsRepository::new(pool.clone())
            .count_on(today, Some(MOTION_EVENT))
            .await?,
        anomalies: AlertsRepository::new(pool.clone()).count_today().await?,
        people_detected: DetectionsRepository::new(pool)
            .count_people_on(today)
            .await?,
        timestamp: iso_now(),
    };

    Ok(Json(stats))
}

/// Motion events and alerts per hour of day over the last `hours` hours
pub async fn get_activity(
    State(state): State<AppState>,
    Query(params): Query<ActivityParams>,
) -> ApiResult<Json<ActivityResponse>> {
    let hours = params.hours.unwrap_or(24).clamp(1, 24 * 31);
    let since = Local::now().timestamp() as f64 - f64::from(hours) * 3600.0;

    let motion = EventsRepository::new(Arc::clone(&state.db_pool))
        .hourly_motion(since)
        .await?;
    let alerts = AlertsRepository::new(Arc::clone(&state.db_pool))
        .hourly_counts(since)
        .await?;

    let keys: Vec<String> = (0..24).map(|hour| format!("{:02}", hour)).collect();

    Ok(Json(ActivityResponse {
        hours: keys.iter().map(|hour| format!("{}:00", hour)).collect(),
        motion_events: keys
            .iter()
            .map(|hour| motion.get(hour).copied().unwrap_or_default())
            .collect(),
        anomalies: keys
            .iter()
            .map(|hour| alerts.get(hour).copied().unwrap_or_default())
            .collect(),
    }))
}

/// Events recorded today, per event type
pub async fn get_event_distribution(
    State(state): State<AppState>,
) -> ApiResult<Json<EventDistributionResponse>> {
    let distribution = EventsRepository::new(Arc::clone(&state.db_pool))
        .distribution_on(Local::now().date_naive())
        .await?;

    let (labels, counts) = distribution.into_iter().unzip();
    Ok(Json(EventDistributionResponse { labels, counts }))
}

/// Placeholder activity heatmap. Detections carry no positions yet, so the
/// points are random.
pub async fn get_heatmap() -> Json<HeatmapResponse> {
    Json(HeatmapResponse {
        points: heatmap_points(&mut rand::thread_rng(), HEATMAP_POINTS),
        timestamp: iso_now(),
    })
}

fn heatmap_points<R: Rng>(rng: &mut R, count: usize) -> Vec<HeatmapPoint> {
    (0..count)
        .map(|_| HeatmapPoint {
            x: rng.gen_range(0.1..0.9),
            y: rng.gen_range(0.1..0.9),
            intensity: rng.gen_range(0.3..0.8),
            radius: rng.gen_range(30..=60),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::rest::test_support::test_state;
    use crate::db::models::VideoStatus;
    use crate::db::repositories::VideosRepository;
    use crate::db::test_support::new_video;

    #[tokio::test]
    async fn test_stats_count_today() -> anyhow::Result<()> {
        let (state, _tmp) = test_state().await;

        let Json(empty) = get_dashboard_stats(State(state.clone())).await.unwrap();
        assert_eq!(empty.active_cameras, 8);
        assert_eq!(empty.normal_events, 0);
        assert_eq!(empty.anomalies, 0);
        assert_eq!(empty.people_detected, 0);

        let video_id = VideosRepository::new(state.db_pool.clone())
            .create(&new_video("cam.mp4", VideoStatus::Completed))
            .await?;
        EventsRepository::new(state.db_pool.clone())
            .backfill_motion(video_id, 4)
            .await?;
        DetectionsRepository::new(state.db_pool.clone())
            .backfill_people(video_id, 6)
            .await?;

        let Json(stats) = get_dashboard_stats(State(state.clone())).await.unwrap();
        assert_eq!(stats.normal_events, 4);
        assert_eq!(stats.people_detected, 6);

        let value = serde_json::to_value(&stats)?;
        assert!(value.get("activeCameras").is_some());
        assert!(value.get("peopleDetected").is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_activity_has_every_hour() -> anyhow::Result<()> {
        let (state, _tmp) = test_state().await;
        let video_id = VideosRepository::new(state.db_pool.clone())
            .create(&new_video("cam.mp4", VideoStatus::Completed))
            .await?;
        EventsRepository::new(state.db_pool.clone())
            .backfill_motion(video_id, 3)
            .await?;

        let Json(activity) = get_activity(State(state.clone()), Query(ActivityParams { hours: None }))
            .await
            .unwrap();
        assert_eq!(activity.hours.len(), 24);
        assert_eq!(activity.hours[0], "00:00");
        assert_eq!(activity.motion_events.iter().sum::<i64>(), 3);
        assert_eq!(activity.anomalies.iter().sum::<i64>(), 0);

        let Json(distribution) = get_event_distribution(State(state)).await.unwrap();
        assert_eq!(distribution.labels, vec!["motion".to_string()]);
        assert_eq!(distribution.counts, vec![3]);
        Ok(())
    }

    #[tokio::test]
    async fn test_heatmap_points_stay_in_frame() {
        let Json(heatmap) = get_heatmap().await;
        assert_eq!(heatmap.points.len(), HEATMAP_POINTS);
        assert!(heatmap.points.iter().all(|p| {
            (0.1..0.9).contains(&p.x)
                && (0.1..0.9).contains(&p.y)
                && (0.3..0.8).contains(&p.intensity)
                && (30..=60).contains(&p.radius)
        }));
    }
}
