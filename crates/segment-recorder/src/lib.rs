//! Segmented Video Recorder
//!
//! Persists a continuous frame stream as fixed-duration video files:
//! - Encoded through OpenCV's `VideoWriter` (XVID in AVI by default)
//! - Rotation on a wall-clock period, strictly before the triggering write
//! - At most one open segment; finalized on rotation, close and drop

pub mod segment;
pub mod video;

pub use segment::{SegmentSink, SegmentWriter, SegmentedRecorder, VideoSink};
pub use video::VideoFileWriter;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Recorder error types
#[derive(Error, Debug)]
pub enum RecorderError {
    #[error("Failed to open segment {path}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("Video backend error: {0}")]
    Video(#[from] opencv::Error),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Frame size {actual:?} does not match segment size {expected:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Frame holds {actual} bytes, expected {expected} for its dimensions")]
    MalformedFrame { expected: usize, actual: usize },

    #[error("Invalid recorder configuration: {0}")]
    InvalidConfig(String),
}

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Directory segment files are written to
    pub output_dir: PathBuf,
    /// File name prefix (`<prefix>_YYYYmmdd_HHMMSS.avi`)
    pub file_prefix: String,
    /// Segment rotation period (seconds)
    pub rotation_period_secs: u64,
    /// Nominal frame rate written to segment headers
    pub fps: u32,
    /// FourCC of the encoder (`XVID`, `MJPG`, ...)
    pub codec: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_prefix: "video".to_string(),
            rotation_period_secs: 60,
            fps: 15,
            codec: "XVID".to_string(),
        }
    }
}

impl RecorderConfig {
    /// Reject settings that would lose frames or cannot be encoded
    pub fn validate(&self) -> Result<(), RecorderError> {
        if self.rotation_period_secs == 0 {
            return Err(RecorderError::InvalidConfig(
                "rotation_period_secs must be at least 1".into(),
            ));
        }
        if self.fps == 0 {
            return Err(RecorderError::InvalidConfig("fps must be at least 1".into()));
        }
        video::fourcc(&self.codec)?;
        Ok(())
    }
}
