//! Face monitor configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Detection thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Average eye openness ratio below which eyes count as closed
    pub eye_closed_threshold: f64,

    /// Continuous eye closure before the subject is reported sleeping (seconds)
    pub sleep_threshold_secs: f64,

    /// Lip gap above which the mouth counts as open (pixels)
    pub mouth_open_threshold_px: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            eye_closed_threshold: 0.2,
            sleep_threshold_secs: 10.0,
            mouth_open_threshold_px: 35.0,
        }
    }
}

impl DetectionConfig {
    /// Sleep threshold as a `Duration`; negative, NaN, infinite or
    /// overflowing values are rejected
    pub fn sleep_threshold(&self) -> Result<Duration, MonitorError> {
        Duration::try_from_secs_f64(self.sleep_threshold_secs).map_err(|e| {
            MonitorError::Config(format!(
                "detection.sleep_threshold_secs = {}: {}",
                self.sleep_threshold_secs, e
            ))
        })
    }

    /// Create strict config (reports sleep sooner)
    pub fn strict() -> Self {
        Self {
            sleep_threshold_secs: 5.0,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerates longer closures)
    pub fn lenient() -> Self {
        Self {
            eye_closed_threshold: 0.15,
            sleep_threshold_secs: 20.0,
            ..Default::default()
        }
    }
}

/// Landmark estimator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Face mesh ONNX model path; no model means no face is ever detected
    #[serde(alias = "model_path")]
    pub mesh_model_path: Option<String>,

    /// Face detector (BlazeFace short-range) ONNX model path, required with a mesh model
    pub detector_model_path: Option<String>,

    /// Detector score required to start tracking a face
    pub detection_confidence: f32,

    /// Mesh face presence required to keep tracking a face
    pub tracking_confidence: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            mesh_model_path: None,
            detector_model_path: None,
            detection_confidence: 0.5,
            tracking_confidence: 0.5,
        }
    }
}
