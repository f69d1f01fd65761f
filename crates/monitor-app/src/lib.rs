//! Face Monitor Application
//!
//! Wires the camera source, landmark estimator, face analysis and the
//! segmented recorder into a single monitoring loop.

pub mod clock;
pub mod config;
pub mod pipeline;
pub mod retry;
pub mod throughput;

pub use crate::clock::{Clock, SystemClock};
pub use crate::config::{AppConfig, LoggingConfig, MonitorConfig, RetryConfig};
pub use crate::pipeline::{LoopSummary, MonitoringLoop, Step};
pub use crate::retry::{RetryDecision, RetryPolicy};
pub use crate::throughput::Throughput;

use face_monitor::MonitorError;
use segment_recorder::RecorderError;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Fatal monitoring loop errors
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Recording failed: {0}")]
    Recorder(#[from] RecorderError),

    #[error("Face monitor setup failed: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Camera unavailable after {failures} consecutive failed fetches")]
    SourceExhausted { failures: u32 },
}

/// Initialize logging; `RUST_LOG` overrides the configured level
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.expect("Failed to set tracing subscriber");
}
