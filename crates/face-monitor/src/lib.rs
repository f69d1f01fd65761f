//! Face Monitoring
//!
//! Real-time subject state analysis from facial landmarks:
//! - Eye openness ratio (eye aspect ratio) per eye
//! - Debounced sleep detection from sustained eye closure
//! - Mouth open (crying) classification from the lip gap
//! - Face detection + face mesh landmark estimation with ONNX models

pub mod analysis;
pub mod annotate;
pub mod config;
pub mod detector;
pub mod expression;
pub mod face_detector;
pub mod landmarks;
pub mod metrics;
mod model;
pub mod state;

pub use analysis::{FrameAnalysis, MonitorAlert};
pub use annotate::annotate;
pub use config::{DetectionConfig, EstimatorConfig};
pub use detector::{FaceMeshEstimator, LandmarkEstimator, NullEstimator};
pub use expression::{ExpressionClassifier, MouthState};
pub use face_detector::{CropRect, FaceBox, FaceDetector};
pub use landmarks::{EyeRegion, LandmarkSet, Point};
pub use metrics::MetricError;
pub use state::{DrowsinessDetector, DrowsinessState, EyeVerdict};

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

/// Face monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Image processing failed: {0}")]
    ImageProcessing(String),

    #[error("Invalid landmark set: {0}")]
    InvalidLandmarks(String),
}

/// Subject monitoring module
///
/// Owns the temporal state; call [`FaceMonitor::analyze`] once per frame.
pub struct FaceMonitor {
    drowsiness: DrowsinessDetector,
    expression: ExpressionClassifier,
    crying: bool,
}

impl FaceMonitor {
    /// Create a new monitor with configuration
    pub fn new(config: &DetectionConfig) -> Result<Self, MonitorError> {
        Ok(Self {
            drowsiness: DrowsinessDetector::new(config.eye_closed_threshold, config.sleep_threshold()?),
            expression: ExpressionClassifier::new(config.mouth_open_threshold_px),
            crying: false,
        })
    }

    /// Analyze one frame's landmarks.
    ///
    /// `None` means no face was found: the drowsiness timer and verdict
    /// are carried over untouched.
    pub fn analyze(
        &mut self,
        landmarks: Option<&LandmarkSet>,
        width: u32,
        height: u32,
        now: Instant,
    ) -> FrameAnalysis {
        let Some(landmarks) = landmarks else {
            return self.no_face();
        };

        let left = metrics::eye_openness(landmarks, &EyeRegion::LEFT, width, height);
        let right = metrics::eye_openness(landmarks, &EyeRegion::RIGHT, width, height);

        let sleeping = match (left, right) {
            (Ok(l), Ok(r)) => self.drowsiness.update((l + r) / 2.0, now),
            (Err(e), _) | (_, Err(e)) => {
                debug!("{}; counting frame as eyes open", e);
                self.drowsiness.mark_open();
                false
            }
        };

        let gap = metrics::mouth_gap(landmarks, width, height);
        let mouth = self.expression.classify_mouth(gap);
        let crying = mouth == MouthState::Open;
        if crying != self.crying {
            info!("Mouth {} (gap {:.1}px)", if crying { "open" } else { "closed" }, gap);
            self.crying = crying;
        }

        let mut alerts = Vec::new();
        if crying {
            alerts.push(MonitorAlert::Crying);
        }
        if sleeping {
            alerts.push(MonitorAlert::Sleeping);
        }

        FrameAnalysis {
            face_detected: true,
            left_openness: left.ok(),
            right_openness: right.ok(),
            mouth_gap: Some(gap),
            mouth,
            sleeping,
            alerts,
        }
    }

    fn no_face(&self) -> FrameAnalysis {
        let sleeping = self.drowsiness.is_sleeping();
        FrameAnalysis {
            face_detected: false,
            sleeping,
            alerts: if sleeping {
                vec![MonitorAlert::Sleeping]
            } else {
                vec![]
            },
            ..Default::default()
        }
    }

    pub fn drowsiness(&self) -> &DrowsinessDetector {
        &self.drowsiness
    }
}
