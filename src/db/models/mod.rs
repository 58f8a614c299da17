pub mod alert_models;
pub mod camera_models;
pub mod detection_models;
pub mod event_models;
pub mod report_models;
pub mod video_models;

pub use alert_models::{Alert, AlertStatus, NewAlert, Severity};
pub use camera_models::Camera;
pub use detection_models::{Detection, DetectionRecord};
pub use event_models::{Event, NewEvent};
pub use report_models::{NewReport, Report};
pub use video_models::{NewVideo, Video, VideoStatus};
