//! Monitoring loop
//!
//! One frame at a time, end to end:
//! fetch -> landmarks -> analysis -> (annotate) -> record -> throughput.
//! The stop flag is checked between frames, never during a write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use camera_capture::FrameSource;
use face_monitor::{annotate, FaceMonitor, FrameAnalysis, LandmarkEstimator};
use segment_recorder::{SegmentSink, SegmentedRecorder, VideoSink};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::retry::{RetryDecision, RetryPolicy};
use crate::throughput::Throughput;
use crate::LoopError;

/// Outcome of one loop iteration
#[derive(Debug, Clone)]
pub enum Step {
    /// No frame this cycle; nothing was analyzed or recorded
    FetchFailed,
    /// Frame analyzed and recorded
    Processed(FrameAnalysis),
}

/// Counters reported when the loop ends
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoopSummary {
    pub frames_processed: u64,
    pub fetch_failures: u64,
    pub segments_started: u64,
    pub frames_recorded: u64,
}

/// Single-threaded capture / analysis / recording loop
pub struct MonitoringLoop<S, E, K, R = VideoSink>
where
    S: FrameSource,
    E: LandmarkEstimator,
    K: Clock,
    R: SegmentSink,
{
    source: S,
    estimator: E,
    clock: K,
    monitor: FaceMonitor,
    recorder: SegmentedRecorder<R>,
    retry: RetryPolicy,
    throughput: Throughput,
    annotate: bool,
    stop: Arc<AtomicBool>,
}

impl<S, E, K, R> MonitoringLoop<S, E, K, R>
where
    S: FrameSource,
    E: LandmarkEstimator,
    K: Clock,
    R: SegmentSink,
{
    pub fn new(
        source: S,
        estimator: E,
        recorder: SegmentedRecorder<R>,
        clock: K,
        config: &AppConfig,
    ) -> Result<Self, LoopError> {
        Ok(Self {
            monitor: FaceMonitor::new(&config.detection)?,
            retry: RetryPolicy::new(&config.retry),
            throughput: Throughput::new(clock.now(), config.monitor.report_every_frames),
            annotate: config.monitor.annotate,
            stop: Arc::new(AtomicBool::new(false)),
            source,
            estimator,
            clock,
            recorder,
        })
    }

    /// Share an externally owned stop flag
    pub fn with_stop(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Flag that ends the loop at the next iteration boundary
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Run until stopped or a fatal error; the recorder is closed on every path
    pub fn run(&mut self) -> Result<LoopSummary, LoopError> {
        info!("Monitoring loop started");

        let result = loop {
            if self.stop.load(Ordering::SeqCst) {
                info!("Stop requested");
                break Ok(());
            }
            if let Err(e) = self.step() {
                error!("Monitoring loop failed: {}", e);
                break Err(e);
            }
        };

        let closed = self.recorder.close();
        let summary = self.summary();
        info!(
            "Monitoring loop ended: {} frames processed, {} fetch failures, {} segments",
            summary.frames_processed, summary.fetch_failures, summary.segments_started
        );

        result?;
        closed?;
        Ok(summary)
    }

    /// Process a single frame
    pub fn step(&mut self) -> Result<Step, LoopError> {
        let mut frame = match self.source.fetch_frame() {
            Ok(frame) => {
                self.retry.record_success();
                frame
            }
            Err(e) => {
                return match self.retry.record_failure() {
                    RetryDecision::Retry(delay) => {
                        warn!(
                            "Could not fetch frame: {} (consecutive failures: {}, retry in {:?})",
                            e,
                            self.retry.consecutive_failures(),
                            delay
                        );
                        self.clock.sleep(delay);
                        Ok(Step::FetchFailed)
                    }
                    RetryDecision::GiveUp => Err(LoopError::SourceExhausted {
                        failures: self.retry.consecutive_failures(),
                    }),
                };
            }
        };

        let now = self.clock.now();
        let landmarks = match self.estimator.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(e) => {
                warn!("Landmark estimation failed, treating as no face: {}", e);
                None
            }
        };

        let analysis = self
            .monitor
            .analyze(landmarks.as_ref(), frame.width, frame.height, now);
        debug!(
            "Frame #{}: face={} ear={:?} mouth={:?}",
            frame.sequence,
            analysis.face_detected,
            analysis.average_openness(),
            analysis.mouth_gap
        );

        if self.annotate {
            annotate(&mut frame, &analysis, landmarks.as_ref());
        }

        self.recorder.submit_frame(&frame, self.clock.wall())?;

        if let Some(fps) = self.throughput.record(self.clock.now()) {
            info!("Capturing at approx {:.2} FPS", fps);
        }

        Ok(Step::Processed(analysis))
    }

    pub fn summary(&self) -> LoopSummary {
        LoopSummary {
            frames_processed: self.throughput.frames(),
            fetch_failures: self.retry.total_failures(),
            segments_started: self.recorder.segments_started(),
            frames_recorded: self.recorder.frames_written(),
        }
    }

    pub fn recorder(&self) -> &SegmentedRecorder<R> {
        &self.recorder
    }

    pub fn monitor(&self) -> &FaceMonitor {
        &self.monitor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::manual::ManualClock;
    use camera_capture::{CameraError, VideoFrame};
    use face_monitor::landmarks::{LOWER_LIP, UPPER_LIP, FACE_MESH_POINTS};
    use face_monitor::{EyeRegion, LandmarkSet, MonitorError, Point};
    use segment_recorder::RecorderConfig;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::Mutex;
    use std::time::Duration;

    const FRAME: Duration = Duration::from_millis(1000 / 15);
    const SIZE: u32 = 32;

    /// Collects formatted log output
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Replays a script of fetch results; sets the stop flag when exhausted
    struct ScriptedSource {
        script: VecDeque<Result<(), CameraError>>,
        sequence: u64,
        stop: Option<Arc<AtomicBool>>,
    }

    impl ScriptedSource {
        fn frames(n: usize) -> Self {
            Self {
                script: (0..n).map(|_| Ok(())).collect(),
                sequence: 0,
                stop: None,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn fetch_frame(&mut self) -> Result<VideoFrame, CameraError> {
            match self.script.pop_front() {
                Some(Ok(())) => {
                    self.sequence += 1;
                    Ok(VideoFrame::solid(SIZE, SIZE, [90, 90, 90], self.sequence))
                }
                Some(Err(e)) => Err(e),
                None => {
                    if let Some(stop) = &self.stop {
                        stop.store(true, Ordering::SeqCst);
                    }
                    Err(CameraError::EndOfStream)
                }
            }
        }
    }

    /// Returns a face with the scripted eye ratio, or no face for `None`
    struct ScriptedEstimator {
        ratios: VecDeque<Option<f64>>,
    }

    impl LandmarkEstimator for ScriptedEstimator {
        fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<LandmarkSet>, MonitorError> {
            Ok(self.ratios.pop_front().flatten().map(face))
        }
    }

    fn face(ratio: f64) -> LandmarkSet {
        let mut points = vec![Point::new(0.5, 0.5); FACE_MESH_POINTS];
        let half = 0.1;
        let lid = ratio * half;
        for (region, cx) in [(EyeRegion::LEFT, 0.7), (EyeRegion::RIGHT, 0.3)] {
            let eye = [
                Point::new(cx - half, 0.4),
                Point::new(cx - 0.03, 0.4 - lid),
                Point::new(cx + 0.03, 0.4 - lid),
                Point::new(cx + half, 0.4),
                Point::new(cx + 0.03, 0.4 + lid),
                Point::new(cx - 0.03, 0.4 + lid),
            ];
            for (idx, p) in region.indices.iter().zip(eye) {
                points[*idx] = p;
            }
        }
        points[UPPER_LIP] = Point::new(0.5, 0.7);
        points[LOWER_LIP] = Point::new(0.5, 0.72);
        LandmarkSet::new(points).unwrap()
    }

    fn test_config(dir: &std::path::Path) -> AppConfig {
        let mut config = AppConfig::default();
        config.recording = RecorderConfig {
            output_dir: dir.to_path_buf(),
            codec: "MJPG".into(),
            ..Default::default()
        };
        config
    }

    type TestLoop = MonitoringLoop<ScriptedSource, ScriptedEstimator, ManualClock>;

    fn build(source: ScriptedSource, ratios: Vec<Option<f64>>, config: &AppConfig, clock: &ManualClock) -> TestLoop {
        let estimator = ScriptedEstimator { ratios: ratios.into() };
        let recorder = SegmentedRecorder::new(config.recording.clone()).unwrap();
        MonitoringLoop::new(source, estimator, recorder, clock.clone(), config).unwrap()
    }

    #[test]
    fn test_no_face_then_closed_eyes_then_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let clock = ManualClock::new();

        let mut ratios = vec![None; 20];
        ratios.extend(std::iter::repeat(Some(0.1)).take(160));
        ratios.push(Some(0.6));
        let total = ratios.len();
        let mut looped = build(ScriptedSource::frames(total), ratios, &config, &clock);

        let mut verdicts = Vec::new();
        for _ in 0..total {
            match looped.step().unwrap() {
                Step::Processed(analysis) => verdicts.push((clock.elapsed(), analysis.sleeping)),
                Step::FetchFailed => panic!("unexpected fetch failure"),
            }
            clock.advance(FRAME);
        }

        // No verdict while no face is visible
        assert!(verdicts[..20].iter().all(|(_, sleeping)| !sleeping));

        // Sleeping only once the closure has lasted longer than 10s
        let closure_start = verdicts[20].0;
        for (at, sleeping) in &verdicts[20..180] {
            let closed_for = *at - closure_start;
            assert_eq!(*sleeping, closed_for > Duration::from_secs(10), "at {:?}", closed_for);
        }
        assert!(verdicts[179].1);

        // One open frame wakes the subject
        assert!(!verdicts[180].1);

        let summary = looped.summary();
        assert_eq!(summary.frames_processed, 181);
        assert_eq!(summary.frames_recorded, 181);
        assert_eq!(summary.segments_started, 1);
    }

    #[test]
    fn test_fetch_failures_skip_cycle_without_state_change() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.detection.sleep_threshold_secs = 0.5;
        let clock = ManualClock::new();

        let mut source = ScriptedSource::frames(0);
        source.script = vec![
            Ok(()),
            Ok(()),
            Err(CameraError::Stream("reset".into())),
            Err(CameraError::Stream("reset".into())),
            Ok(()),
        ]
        .into();
        let mut looped = build(source, vec![Some(0.1); 3], &config, &clock);

        assert!(matches!(looped.step().unwrap(), Step::Processed(_)));
        clock.advance(Duration::from_secs(1));
        match looped.step().unwrap() {
            Step::Processed(analysis) => assert!(analysis.sleeping),
            Step::FetchFailed => panic!("unexpected fetch failure"),
        }
        let closure_start = looped.monitor().drowsiness().state().closure_start;
        assert!(closure_start.is_some());

        let before = clock.elapsed();
        assert!(matches!(looped.step().unwrap(), Step::FetchFailed));
        assert!(matches!(looped.step().unwrap(), Step::FetchFailed));
        // Backoff of 100ms then 200ms
        assert_eq!(clock.elapsed() - before, Duration::from_millis(300));

        // Timer and verdict untouched by the failed cycles
        assert_eq!(looped.monitor().drowsiness().state().closure_start, closure_start);
        assert!(looped.monitor().drowsiness().is_sleeping());

        match looped.step().unwrap() {
            Step::Processed(analysis) => assert!(analysis.sleeping),
            Step::FetchFailed => panic!("unexpected fetch failure"),
        }
        assert_eq!(looped.monitor().drowsiness().state().closure_start, closure_start);

        let summary = looped.summary();
        assert_eq!(summary.fetch_failures, 2);
        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.frames_recorded, 3);
    }

    #[test]
    fn test_sleep_transitions_logged_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.detection.sleep_threshold_secs = 0.5;
        let clock = ManualClock::new();

        let logs = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .with_writer({
                let logs = logs.clone();
                move || LogCapture(logs.clone())
            })
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut looped = build(
                ScriptedSource::frames(3),
                vec![Some(0.1), Some(0.1), Some(0.6)],
                &config,
                &clock,
            );
            for _ in 0..3 {
                looped.step().unwrap();
                clock.advance(Duration::from_secs(1));
            }
        });

        let output = String::from_utf8(logs.lock().unwrap().clone()).unwrap();
        let count = |needle: &str| output.lines().filter(|l| l.to_lowercase().contains(needle)).count();
        assert_eq!(count("sleeping"), 1, "{}", output);
        assert_eq!(count("awake"), 1, "{}", output);
    }

    #[test]
    fn test_run_stops_and_closes_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let clock = ManualClock::new();

        let stop = Arc::new(AtomicBool::new(false));
        let mut source = ScriptedSource::frames(45);
        source.stop = Some(stop.clone());
        let mut looped = build(source, vec![Some(0.3); 45], &config, &clock).with_stop(stop);

        let summary = looped.run().unwrap();
        assert_eq!(summary.frames_processed, 45);
        assert_eq!(summary.fetch_failures, 1);
        assert!(looped.recorder().current_path().is_none());

        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_give_up_is_fatal_but_closes_recorder() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.retry.max_consecutive_failures = Some(3);
        let clock = ManualClock::new();

        let mut looped = build(ScriptedSource::frames(5), vec![None; 5], &config, &clock);
        let err = looped.run().unwrap_err();

        assert!(matches!(err, LoopError::SourceExhausted { failures: 4 }));
        assert_eq!(looped.summary().frames_recorded, 5);
        assert!(looped.recorder().current_path().is_none());
    }

    #[test]
    fn test_stop_before_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let clock = ManualClock::new();

        let mut looped = build(ScriptedSource::frames(10), vec![], &config, &clock);
        looped.stop_handle().store(true, Ordering::SeqCst);

        let summary = looped.run().unwrap();
        assert_eq!(summary.frames_processed, 0);
        assert_eq!(summary.segments_started, 0);
    }
}
