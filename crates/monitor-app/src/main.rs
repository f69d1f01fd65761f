//! Face Monitor - Main Entry Point

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use camera_capture::MjpegStreamSource;
use face_monitor::FaceMeshEstimator;
use monitor_app::{init_logging, AppConfig, LoopSummary, MonitoringLoop, SystemClock};
use segment_recorder::SegmentedRecorder;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = AppConfig::default_path();
    let config = AppConfig::load(&config_path)
        .with_context(|| format!("loading configuration from {}", config_path.display()))?;
    init_logging(&config.logging);

    info!("=== Face Monitor v{} ===", env!("CARGO_PKG_VERSION"));
    info!("Camera stream: {}", config.camera.url);
    info!("Press Ctrl-C or type 'q' + Enter to stop");

    let stop = Arc::new(AtomicBool::new(false));
    spawn_stdin_watcher(stop.clone());

    let loop_stop = stop.clone();
    let mut worker = tokio::task::spawn_blocking(move || run_monitor(config, loop_stop));

    let summary = tokio::select! {
        result = &mut worker => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, finishing current frame");
            stop.store(true, Ordering::SeqCst);
            worker.await?
        }
    }?;

    info!(
        "Recorded {} frames into {} segments",
        summary.frames_recorded, summary.segments_started
    );
    Ok(())
}

/// Build the pipeline on the blocking thread that runs it
fn run_monitor(config: AppConfig, stop: Arc<AtomicBool>) -> anyhow::Result<LoopSummary> {
    std::fs::create_dir_all(&config.recording.output_dir).with_context(|| {
        format!(
            "creating output directory {}",
            config.recording.output_dir.display()
        )
    })?;

    let source = MjpegStreamSource::new(config.camera.clone())?;
    let estimator = FaceMeshEstimator::from_config(&config.estimator)?;
    let recorder = SegmentedRecorder::new(config.recording.clone())?;

    let mut monitoring = MonitoringLoop::new(source, estimator, recorder, SystemClock, &config)?.with_stop(stop);
    Ok(monitoring.run()?)
}

/// Stop when the user types `q`
fn spawn_stdin_watcher(stop: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("q") => {
                    info!("Stop requested from console");
                    stop.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Console input closed: {}", e);
                    break;
                }
            }
        }
    });
}
