use anyhow::Result;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use vigil::api::rest::{AppState, RestApi};
use vigil::config;
use vigil::db::DatabaseService;
use vigil::messaging::{self, LogNotifier, Notifier};
use vigil::{AlertManager, ReportGenerator, VideoProcessor};

async fn run_app() -> Result<()> {
    // Load configuration
    let config_path = std::env::var_os("VIGIL_CONFIG").map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    // Initialize logging
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.api.log_level.as_str()),
    )
    .init();
    info!("Starting Vigil security analytics backend");

    // Open the database and make sure the schema exists
    let database = DatabaseService::new(&config.database).await?;
    info!("Database ready at {:?}", config.database.path);

    std::fs::create_dir_all(&config.storage.upload_dir)?;
    std::fs::create_dir_all(&config.storage.reports_dir)?;

    // Alerts go to the broker when one is configured and reachable
    let notifier: Arc<dyn Notifier> = match messaging::create_notifier(&config.notifications).await
    {
        Ok(notifier) => notifier,
        Err(e) => {
            warn!("Notification backend unavailable, logging alerts instead: {}", e);
            Arc::new(LogNotifier)
        }
    };

    let state = AppState {
        db_pool: database.pool.clone(),
        alert_manager: Arc::new(AlertManager::new(database.pool.clone(), notifier)),
        video_processor: Arc::new(VideoProcessor::new(config.processing.clone())),
        report_generator: Arc::new(ReportGenerator::new(
            database.pool.clone(),
            config.storage.reports_dir.clone(),
        )),
        storage: Arc::new(config.storage.clone()),
    };

    // Start the REST API, blocks until shutdown
    let http_server = RestApi::new(&config.api, state)?;
    http_server.run().await?;

    database.pool.close().await;
    info!("Shutting down...");
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run_app()) {
        eprintln!("Application error: {:#}", e);
        std::process::exit(1);
    }
}
