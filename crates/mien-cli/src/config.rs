use std::path::PathBuf;

use mien_core::policy::{
    DEFAULT_CENTER_DISTANCE_THRESHOLD, DEFAULT_LANDMARK_DISTANCE_THRESHOLD,
};
use mien_core::DecisionConfig;

/// CLI configuration, loaded from environment variables.
pub struct Config {
    /// Path to the SQLite registry database.
    pub db_path: PathBuf,
    /// Maximum distance in pixels between bounding-box centers.
    pub center_threshold: f32,
    /// Maximum mean distance in pixels between core landmarks.
    pub landmark_threshold: f32,
}

impl Config {
    /// Load configuration from `MIEN_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("mien");

        let db_path = std::env::var("MIEN_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("users.db"));

        Self {
            db_path,
            center_threshold: env_f32(
                "MIEN_CENTER_THRESHOLD",
                DEFAULT_CENTER_DISTANCE_THRESHOLD,
            ),
            landmark_threshold: env_f32(
                "MIEN_LANDMARK_THRESHOLD",
                DEFAULT_LANDMARK_DISTANCE_THRESHOLD,
            ),
        }
    }

    /// Decision thresholds as a matcher config.
    pub fn decision_config(&self) -> DecisionConfig {
        DecisionConfig {
            center_distance_threshold: self.center_threshold,
            landmark_distance_threshold: self.landmark_threshold,
        }
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
