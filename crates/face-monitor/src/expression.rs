//! Mouth state classification

use serde::{Deserialize, Serialize};

/// Mouth state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MouthState {
    Open,
    #[default]
    Closed,
}

/// Per-frame mouth classifier. No smoothing: consecutive frames may flicker.
#[derive(Debug, Clone, Copy)]
pub struct ExpressionClassifier {
    mouth_open_threshold_px: f64,
}

impl ExpressionClassifier {
    pub fn new(mouth_open_threshold_px: f64) -> Self {
        Self {
            mouth_open_threshold_px,
        }
    }

    /// Open only when the gap strictly exceeds the threshold
    pub fn classify_mouth(&self, gap: f64) -> MouthState {
        if gap > self.mouth_open_threshold_px {
            MouthState::Open
        } else {
            MouthState::Closed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_exclusive() {
        let classifier = ExpressionClassifier::new(35.0);
        assert_eq!(classifier.classify_mouth(35.0), MouthState::Closed);
        assert_eq!(classifier.classify_mouth(35.0001), MouthState::Open);
    }

    #[test]
    fn test_small_gaps_closed() {
        let classifier = ExpressionClassifier::new(35.0);
        assert_eq!(classifier.classify_mouth(0.0), MouthState::Closed);
        assert_eq!(classifier.classify_mouth(12.5), MouthState::Closed);
        assert_eq!(classifier.classify_mouth(80.0), MouthState::Open);
    }
}
