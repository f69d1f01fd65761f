//! Per-frame analysis results and alerts

use serde::{Deserialize, Serialize};

use crate::expression::MouthState;

/// Monitor alert types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorAlert {
    /// Eyes closed past the sleep threshold
    Sleeping,

    /// Mouth open past the gap threshold
    Crying,
}

/// Complete analysis of one frame
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameAnalysis {
    /// Whether a face was detected
    pub face_detected: bool,

    /// Left eye openness ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_openness: Option<f64>,

    /// Right eye openness ratio
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_openness: Option<f64>,

    /// Lip gap in pixels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mouth_gap: Option<f64>,

    pub mouth: MouthState,

    /// Sleep verdict (carried over unchanged on frames without a face)
    pub sleeping: bool,

    /// Active alerts
    pub alerts: Vec<MonitorAlert>,
}

impl FrameAnalysis {
    /// Mean of both eye ratios, when both are available
    pub fn average_openness(&self) -> Option<f64> {
        match (self.left_openness, self.right_openness) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            _ => None,
        }
    }

    pub fn crying(&self) -> bool {
        self.mouth == MouthState::Open
    }

    /// Check if any alerts are active
    pub fn has_alerts(&self) -> bool {
        !self.alerts.is_empty()
    }
}
