use crate::alerts::AlertManager;
use crate::config::{ApiConfig, StorageConfig};
use crate::db;
use crate::error::Error;
use crate::processing::VideoProcessor;
use crate::reports::ReportGenerator;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

pub mod alerts_controller;
pub mod cameras_controller;
pub mod dashboard_controller;
pub mod reports_controller;
pub mod videos_controller;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Arc<SqlitePool>,
    pub alert_manager: Arc<AlertManager>,
    pub video_processor: Arc<VideoProcessor>,
    pub report_generator: Arc<ReportGenerator>,
    pub storage: Arc<StorageConfig>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub message: String,
    pub status: u16,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::BAD_REQUEST.as_u16(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::NOT_FOUND.as_u16(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status = match err {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        ApiError {
            message: err.to_string(),
            status: status.as_u16(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return (*err).clone().into();
        }

        ApiError {
            message: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Paging parameters shared by list endpoints
#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    pub const DEFAULT_LIMIT: i64 = 50;

    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(Self::DEFAULT_LIMIT).max(0)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// Local wall-clock time as an ISO 8601 string without offset
pub fn iso_now() -> String {
    db::local_now().format("%Y-%m-%dT%H:%M:%S").to_string()
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(config: &ApiConfig, state: AppState) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state,
        })
    }

    /// Build the full application router
    pub fn router(&self) -> Router {
        // Create a CORS layer that allows all origins and preflight requests
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(false)
            .max_age(Duration::from_secs(3600));

        let body_limit = self.config.max_upload_mb.saturating_mul(1024 * 1024);

        Router::new()
            .route("/api/health", get(health_check))
            .nest("/api/dashboard", dashboard_controller::create_router())
            .nest("/api/analytics", dashboard_controller::create_analytics_router())
            .nest("/api/alerts", alerts_controller::create_router())
            .nest("/api/cameras", cameras_controller::create_router())
            .nest("/api/videos", videos_controller::create_router())
            .nest("/api/reports", reports_controller::create_router())
            .with_state(self.state.clone())
            // Everything else is the dashboard frontend
            .fallback_service(ServeDir::new(&self.config.frontend_dir))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(cors)
    }

    /// Serve until ctrl-c is received
    pub async fn run(&self) -> Result<()> {
        let app = self.router();

        // Build the server address
        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        // Log that we're starting
        info!("API server listening on {}", addr);

        // Create a listener and start the server
        let listener = TcpListener::bind(addr).await?;

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Shutdown signal received");
                }
            })
            .await?;

        Ok(())
    }
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": iso_now(),
        "version": env!("CARGO_PKG_VERSION"),
        "services": {
            "database": db::health_check(&state.db_pool).await,
            "video_processor": state.video_processor.is_ready(),
            "alert_system": state.alert_manager.is_active(),
        }
    }))
}
