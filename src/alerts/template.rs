use crate::db::models::Severity;
use serde_json::{Map, Value};

/// How alerts of one type are raised
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertTypeConfig {
    pub default_severity: Severity,
    /// Whether new alerts of this type are sent to the notifier
    pub notify: bool,
    /// Description with `{key}` placeholders filled from alert metadata
    pub template: &'static str,
}

/// Alert types with their own configuration
pub const KNOWN_ALERT_TYPES: [&str; 6] = [
    "crowd_formation",
    "abandoned_object",
    "suspicious_object",
    "intrusion",
    "loitering",
    "restricted_area",
];

const UNKNOWN_TYPE: AlertTypeConfig = AlertTypeConfig {
    default_severity: Severity::Medium,
    notify: false,
    template: "Security anomaly detected",
};

/// Configuration for `alert_type`, falling back to a silent medium alert
pub fn config_for(alert_type: &str) -> AlertTypeConfig {
    let (default_severity, template) = match alert_type {
        "crowd_formation" => (Severity::Medium, "Crowd detected: {people_count} people"),
        "abandoned_object" => (Severity::High, "Unattended {object_type} detected"),
        "suspicious_object" => (
            Severity::Critical,
            "{object_type} detected with {confidence}% confidence",
        ),
        "intrusion" => (Severity::Critical, "Unauthorized entry detected"),
        "loitering" => (Severity::Medium, "Person loitering for extended period"),
        "restricted_area" => (Severity::High, "Access to restricted area detected"),
        _ => return UNKNOWN_TYPE,
    };

    AlertTypeConfig {
        default_severity,
        notify: true,
        template,
    }
}

/// Fill `{key}` placeholders in `template` from `metadata`.
///
/// Strings are inserted without quotes, other values as JSON text.
/// Placeholders with no matching key are left as they are.
pub fn describe(template: &str, metadata: &Map<String, Value>) -> String {
    metadata
        .iter()
        .fold(template.to_string(), |description, (key, value)| {
            let placeholder = format!("{{{}}}", key);
            if !description.contains(&placeholder) {
                return description;
            }
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            description.replace(&placeholder, &text)
        })
}
