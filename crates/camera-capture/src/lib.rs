//! Camera Capture Library for Face Monitoring
//!
//! Acquires frames from a network camera and hands them to the monitor
//! as decoded RGB frames.
//! Supports:
//! - MJPEG over HTTP streams (ESP32-CAM style `multipart/x-mixed-replace`)
//! - Any custom source implementing [`FrameSource`]

pub mod frame;
pub mod source;

pub use frame::VideoFrame;
pub use source::{FrameSource, MjpegStreamSource};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Camera error types
///
/// Every variant is a transient fetch failure from the caller's point of
/// view: the next fetch retries from scratch.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Failed to open camera stream: {0}")]
    Open(String),

    #[error("Streaming error: {0}")]
    Stream(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Camera stream ended")]
    EndOfStream,
}

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Stream URL (e.g., "http://192.168.31.35:81/stream")
    pub url: String,
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: u64,
    /// Largest encoded frame accepted before the buffer is discarded
    pub max_frame_bytes: usize,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "http://192.168.31.35:81/stream".to_string(),
            connect_timeout_ms: 5000,
            max_frame_bytes: 4 * 1024 * 1024,
        }
    }
}
