//! Rotating segment recorder

use std::path::{Path, PathBuf};

use camera_capture::frame::VideoFrame;
use chrono::{DateTime, Local};
use tracing::{error, info};

use crate::video::VideoFileWriter;
use crate::{RecorderConfig, RecorderError};

/// An open segment file accepting frames
pub trait SegmentWriter {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecorderError>;

    /// Flush and finalize the segment. Called exactly once per segment.
    fn finish(&mut self) -> Result<(), RecorderError>;
}

/// Factory for segment writers
pub trait SegmentSink {
    type Writer: SegmentWriter;

    fn open(&mut self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Self::Writer, RecorderError>;
}

/// Writes segment files through OpenCV
#[derive(Debug, Clone)]
pub struct VideoSink {
    codec: String,
}

impl VideoSink {
    pub fn new(codec: impl Into<String>) -> Self {
        Self { codec: codec.into() }
    }
}

impl SegmentWriter for VideoFileWriter {
    fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        VideoFileWriter::write_frame(self, frame)
    }

    fn finish(&mut self) -> Result<(), RecorderError> {
        VideoFileWriter::finish(self)
    }
}

impl SegmentSink for VideoSink {
    type Writer = VideoFileWriter;

    fn open(&mut self, path: &Path, width: u32, height: u32, fps: u32) -> Result<Self::Writer, RecorderError> {
        VideoFileWriter::create(path, width, height, fps, &self.codec)
    }
}

struct ActiveSegment<W> {
    path: PathBuf,
    created: DateTime<Local>,
    dimensions: (u32, u32),
    frames: u64,
    writer: W,
}

/// Splits a frame stream into fixed-duration segment files.
///
/// Every submitted frame lands in exactly one segment: rotation happens
/// before the triggering frame is written, and that frame opens the new
/// segment. Segment names have one-second resolution, so two rotations
/// within the same second would target the same file.
pub struct SegmentedRecorder<S: SegmentSink = VideoSink> {
    config: RecorderConfig,
    sink: S,
    current: Option<ActiveSegment<S::Writer>>,
    rotation_period: chrono::Duration,
    segments_started: u64,
    frames_written: u64,
}

impl SegmentedRecorder<VideoSink> {
    pub fn new(config: RecorderConfig) -> Result<Self, RecorderError> {
        let sink = VideoSink::new(config.codec.clone());
        Self::with_sink(config, sink)
    }
}

impl<S: SegmentSink> SegmentedRecorder<S> {
    pub fn with_sink(config: RecorderConfig, sink: S) -> Result<Self, RecorderError> {
        config.validate()?;
        let secs = i64::try_from(config.rotation_period_secs)
            .unwrap_or(i64::MAX)
            .min(i64::MAX / 1000);
        Ok(Self {
            rotation_period: chrono::Duration::seconds(secs),
            config,
            sink,
            current: None,
            segments_started: 0,
            frames_written: 0,
        })
    }

    /// Write a frame, rotating first if the active segment is due
    pub fn submit_frame(&mut self, frame: &VideoFrame, now: DateTime<Local>) -> Result<(), RecorderError> {
        if !frame.is_well_formed() {
            return Err(RecorderError::MalformedFrame {
                expected: frame.expected_len(),
                actual: frame.data.len(),
            });
        }

        let due = match &self.current {
            None => true,
            Some(segment) => now.signed_duration_since(segment.created) >= self.rotation_period,
        };
        if due {
            self.rotate(frame.dimensions(), now)?;
        }

        let Some(segment) = self.current.as_mut() else {
            return Err(RecorderError::Encode("no active segment".into()));
        };

        if segment.dimensions != frame.dimensions() {
            let expected = segment.dimensions;
            error!(
                "Frame size changed from {:?} to {:?} mid-segment, closing {}",
                expected,
                frame.dimensions(),
                segment.path.display()
            );
            self.close()?;
            return Err(RecorderError::DimensionMismatch {
                expected,
                actual: frame.dimensions(),
            });
        }

        segment.writer.write_frame(frame)?;
        segment.frames += 1;
        self.frames_written += 1;
        Ok(())
    }

    /// Finalize the active segment, if any. Idempotent.
    pub fn close(&mut self) -> Result<(), RecorderError> {
        let Some(mut segment) = self.current.take() else {
            return Ok(());
        };
        segment.writer.finish()?;
        info!(
            "Closed video segment {} ({} frames)",
            segment.path.display(),
            segment.frames
        );
        Ok(())
    }

    fn rotate(&mut self, (width, height): (u32, u32), now: DateTime<Local>) -> Result<(), RecorderError> {
        if let Err(e) = self.close() {
            error!("Failed to finalize previous segment: {}", e);
        }

        let path = self.segment_path(now);
        let writer = self.sink.open(&path, width, height, self.config.fps)?;
        info!("Started new video: {}", path.display());

        self.current = Some(ActiveSegment {
            path,
            created: now,
            dimensions: (width, height),
            frames: 0,
            writer,
        });
        self.segments_started += 1;
        Ok(())
    }

    fn segment_path(&self, now: DateTime<Local>) -> PathBuf {
        self.config.output_dir.join(format!(
            "{}_{}.avi",
            self.config.file_prefix,
            now.format("%Y%m%d_%H%M%S")
        ))
    }

    /// Path of the open segment
    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_ref().map(|s| s.path.as_path())
    }

    pub fn segments_started(&self) -> u64 {
        self.segments_started
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl<S: SegmentSink> Drop for SegmentedRecorder<S> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            error!("Failed to close video segment on drop: {}", e);
        }
    }
}
