use crate::alerts::AnomalyEvent;
use crate::config::ProcessingConfig;
use crate::db::models::{DetectionRecord, Severity};
use chrono::Local;
use log::{error, info};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

const PERSON: &str = "person";
const OTHER_CLASSES: [&str; 4] = ["car", "bag", "bicycle", "dog"];
/// Frames that produce detections, at most
const DETECTION_FRAMES: u64 = 50;

/// Outcome of processing one uploaded video, stored as the video's results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub total_frames: u64,
    #[serde(default)]
    pub processed_frames: u64,
    #[serde(default)]
    pub people_count: u32,
    #[serde(default)]
    pub normal_events_count: u32,
    #[serde(default)]
    pub detections: Vec<DetectionRecord>,
    #[serde(default)]
    pub anomalies: Vec<AnomalyEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Analysis>,
}

impl ProcessingResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Summary of what was found in a video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Analysis {
    pub total_detections: usize,
    pub total_anomalies: usize,
    pub object_counts: BTreeMap<String, usize>,
    /// Detections per second of video
    pub detection_rate: f64,
    /// Anomalies per second of video
    pub anomaly_rate: f64,
    pub most_common_object: Option<String>,
}

/// Produces simulated analysis results for uploaded videos
pub struct VideoProcessor {
    config: ProcessingConfig,
}

impl VideoProcessor {
    pub fn new(config: ProcessingConfig) -> Self {
        info!("Video processor initialized");
        Self { config }
    }

    pub fn is_ready(&self) -> bool {
        self.config.default_fps > 0.0
    }

    /// Analyse the video at `path` with a fresh random source
    pub async fn process(&self, path: &Path, video_id: i64) -> ProcessingResult {
        let mut rng = StdRng::from_entropy();
        self.process_with_rng(path, video_id, &mut rng).await
    }

    /// Analyse the video at `path`, drawing every simulated value from `rng`
    pub async fn process_with_rng<R: Rng + Send>(
        &self,
        path: &Path,
        video_id: i64,
        rng: &mut R,
    ) -> ProcessingResult {
        info!("Processing video {}: {:?}", video_id, path);

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                error!("Error processing video {}: {:?} is not a file", video_id, path);
                return ProcessingResult::failed(format!("Not a video file: {}", path.display()));
            }
            Err(e) => {
                error!("Error processing video {}: {}", video_id, e);
                return ProcessingResult::failed(format!(
                    "Video file not found: {} ({})",
                    path.display(),
                    e
                ));
            }
        }

        self.simulate(rng)
    }

    fn simulate<R: Rng>(&self, rng: &mut R) -> ProcessingResult {
        let fps = self.config.default_fps;
        let duration = rng.gen_range(10.0..=120.0);
        let total_frames = (duration * fps).round() as u64;
        let processed_frames = total_frames.min(self.config.max_processed_frames);

        let people_count = rng.gen_range(5..=20);
        let normal_events_count = rng.gen_range(10..=30);

        let detections = sample_detections(rng, processed_frames, fps, people_count);
        let anomalies = sample_anomalies(rng);
        let analysis = summarize(&detections, &anomalies, duration);

        ProcessingResult {
            success: true,
            error: None,
            duration,
            fps,
            total_frames,
            processed_frames,
            people_count,
            normal_events_count,
            detections,
            anomalies,
            analysis: Some(analysis),
        }
    }
}

fn sample_detections<R: Rng>(
    rng: &mut R,
    frame_count: u64,
    fps: f64,
    target_people: u32,
) -> Vec<DetectionRecord> {
    let mut detections = Vec::new();
    let mut people = 0;

    for frame in 0..frame_count.min(DETECTION_FRAMES) {
        let timestamp = if fps > 0.0 {
            frame as f64 / fps
        } else {
            frame as f64
        };

        for _ in 0..rng.gen_range(0..=3) {
            let object_class = if people < target_people && rng.gen::<f64>() > 0.3 {
                people += 1;
                PERSON
            } else {
                OTHER_CLASSES.choose(rng).copied().unwrap_or("car")
            };

            let (x1, x2) = ordered_pair(rng);
            let (y1, y2) = ordered_pair(rng);
            detections.push(DetectionRecord {
                frame_number: frame as i64,
                timestamp,
                object_class: object_class.to_string(),
                confidence: rng.gen_range(0.5..0.95),
                bbox: [x1, y1, x2, y2],
            });
        }
    }

    detections
}

fn ordered_pair<R: Rng>(rng: &mut R) -> (f64, f64) {
    let a: f64 = rng.gen();
    let b: f64 = rng.gen();
    (a.min(b), a.max(b))
}

fn sample_anomalies<R: Rng>(rng: &mut R) -> Vec<AnomalyEvent> {
    let candidates = [
        (
            "crowd_formation",
            Severity::Medium,
            "Crowd of 8 people detected",
            json!({"people_count": 8}),
        ),
        (
            "abandoned_object",
            Severity::High,
            "Unattended backpack detected",
            json!({"object_type": "backpack"}),
        ),
        (
            "loitering",
            Severity::Low,
            "Person loitering for extended period",
            json!({"duration_seconds": 45}),
        ),
    ];

    let now = Local::now().timestamp() as f64;
    let count = rng.gen_range(1..=2);

    candidates
        .choose_multiple(rng, count)
        .map(|(alert_type, severity, description, metadata)| AnomalyEvent {
            alert_type: alert_type.to_string(),
            severity: Some(*severity),
            description: Some(description.to_string()),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            timestamp: Some(now),
        })
        .collect()
}

fn summarize(detections: &[DetectionRecord], anomalies: &[AnomalyEvent], duration: f64) -> Analysis {
    let mut object_counts: BTreeMap<String, usize> = BTreeMap::new();
    for detection in detections {
        *object_counts
            .entry(detection.object_class.clone())
            .or_default() += 1;
    }

    let per_second = |n: usize| if duration > 0.0 { n as f64 / duration } else { 0.0 };

    // Ties go to the alphabetically first class
    let most_common_object = object_counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(class, _)| class.clone());

    Analysis {
        total_detections: detections.len(),
        total_anomalies: anomalies.len(),
        detection_rate: per_second(detections.len()),
        anomaly_rate: per_second(anomalies.len()),
        object_counts,
        most_common_object,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn processor() -> VideoProcessor {
        VideoProcessor::new(ProcessingConfig::default())
    }

    fn video_file(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"not really a video").unwrap();
        path
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = processor()
            .process(&dir.path().join("missing.mp4"), 1)
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("missing.mp4"));
        assert!(result.detections.is_empty());
        assert!(result.analysis.is_none());
    }

    #[tokio::test]
    async fn test_simulated_values_stay_in_range() {
        let dir = TempDir::new().unwrap();
        let path = video_file(&dir);
        let processor = processor();

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let result = processor.process_with_rng(&path, 1, &mut rng).await;

            assert!(result.success);
            assert!((10.0..=120.0).contains(&result.duration));
            assert_eq!(result.fps, 30.0);
            assert_eq!(result.total_frames, (result.duration * 30.0).round() as u64);
            assert_eq!(result.processed_frames, 100);
            assert!((5..=20).contains(&result.people_count));
            assert!((10..=30).contains(&result.normal_events_count));

            let people = result
                .detections
                .iter()
                .filter(|d| d.object_class == "person")
                .count();
            assert!(people as u32 <= result.people_count);
            for detection in &result.detections {
                assert!(detection.frame_number < 50);
                assert!((0.5..0.95).contains(&detection.confidence));
                assert!(detection.bbox[0] <= detection.bbox[2]);
                assert!(detection.bbox[1] <= detection.bbox[3]);
            }

            assert!((1..=2).contains(&result.anomalies.len()));
            let types: HashSet<_> = result.anomalies.iter().map(|a| &a.alert_type).collect();
            assert_eq!(types.len(), result.anomalies.len());
            assert!(result.anomalies.iter().all(|a| a.timestamp.is_some()));

            let analysis = result.analysis.unwrap();
            assert_eq!(analysis.total_detections, result.detections.len());
            assert_eq!(
                analysis.object_counts.values().sum::<usize>(),
                result.detections.len()
            );
        }
    }

    #[tokio::test]
    async fn test_same_seed_same_detections() {
        let dir = TempDir::new().unwrap();
        let path = video_file(&dir);
        let processor = processor();

        let first = processor
            .process_with_rng(&path, 1, &mut StdRng::seed_from_u64(42))
            .await;
        let second = processor
            .process_with_rng(&path, 1, &mut StdRng::seed_from_u64(42))
            .await;

        assert_eq!(first.duration, second.duration);
        assert_eq!(first.detections, second.detections);
        assert_eq!(first.analysis, second.analysis);
    }

    #[test]
    fn test_summary_of_nothing() {
        let analysis = summarize(&[], &[], 0.0);
        assert_eq!(analysis.total_detections, 0);
        assert_eq!(analysis.detection_rate, 0.0);
        assert_eq!(analysis.most_common_object, None);
    }

    #[test]
    fn test_result_serializes_anomaly_type_field() {
        let mut result = ProcessingResult {
            success: true,
            ..Default::default()
        };
        result.anomalies.push(AnomalyEvent::new("loitering"));

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["anomalies"][0]["type"], "loitering");
        assert!(value.get("error").is_none());
    }
}
