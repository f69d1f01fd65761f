//! Application configuration
//!
//! Sources, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. TOML file (`MONITOR_CONFIG`, default `monitor.toml`; optional)
//! 3. Environment variables, e.g. `MONITOR_CAMERA__URL`

use std::path::{Path, PathBuf};

use camera_capture::CameraConfig;
use face_monitor::{DetectionConfig, EstimatorConfig};
use segment_recorder::RecorderConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming the config file
pub const CONFIG_PATH_VAR: &str = "MONITOR_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "monitor.toml";

/// Full application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub detection: DetectionConfig,
    pub estimator: EstimatorConfig,
    pub recording: RecorderConfig,
    pub retry: RetryConfig,
    pub monitor: MonitorConfig,
    pub logging: LoggingConfig,
}

/// Frame fetch retry policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay after the first failed fetch (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound for the exponential backoff (milliseconds)
    pub max_delay_ms: u64,
    /// Give up after this many consecutive failures; unset retries forever
    pub max_consecutive_failures: Option<u32>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 100,
            max_delay_ms: 2000,
            max_consecutive_failures: None,
        }
    }
}

/// Loop behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Log a throughput report every N processed frames
    pub report_every_frames: u64,
    /// Draw alert badges and tracked points onto recorded frames
    pub annotate: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            report_every_frames: 30,
            annotate: true,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Config file path from the environment, or the default
    pub fn default_path() -> PathBuf {
        std::env::var_os(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load defaults, then the (optional) file, then `MONITOR_*` variables
    pub fn load(path: &Path) -> Result<Self, ::config::ConfigError> {
        let config: Self = ::config::Config::builder()
            .add_source(::config::File::from(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("MONITOR")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<(), ::config::ConfigError> {
        self.detection
            .sleep_threshold()
            .map_err(|e| ::config::ConfigError::Message(e.to_string()))?;
        self.recording
            .validate()
            .map_err(|e| ::config::ConfigError::Message(e.to_string()))?;
        Ok(())
    }
}
