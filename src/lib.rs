pub mod alerts;
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod messaging;
pub mod processing;
pub mod reports;

// Re-export main components for easier use
pub use alerts::{AlertManager, AnomalyEvent};
pub use api::rest::{AppState, RestApi};
pub use error::Error;
pub use processing::VideoProcessor;
pub use reports::ReportGenerator;
