pub mod alerts;
pub mod cameras;
pub mod detections;
pub mod events;
pub mod reports;
pub mod videos;

pub use alerts::AlertsRepository;
pub use cameras::CamerasRepository;
pub use detections::DetectionsRepository;
pub use events::EventsRepository;
pub use reports::ReportsRepository;
pub use videos::VideosRepository;
