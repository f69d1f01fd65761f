//! Video file writer backed by OpenCV's `VideoWriter`

use std::path::{Path, PathBuf};

use camera_capture::frame::VideoFrame;
use opencv::core::{Mat, Scalar, Size, CV_8UC3};
use opencv::prelude::*;
use opencv::videoio::VideoWriter;
use tracing::debug;

use crate::RecorderError;

/// Parse a four-character codec code such as `XVID` or `MJPG`
pub fn fourcc(codec: &str) -> Result<i32, RecorderError> {
    let chars: Vec<char> = codec.chars().collect();
    match chars.as_slice() {
        [a, b, c, d] => Ok(VideoWriter::fourcc(*a, *b, *c, *d)?),
        _ => Err(RecorderError::InvalidConfig(format!(
            "codec must be a four-character code, got {:?}",
            codec
        ))),
    }
}

/// One open video file
///
/// Frames arrive as RGB24 and are converted into a reusable BGR `Mat`
/// before being handed to the encoder.
pub struct VideoFileWriter {
    writer: VideoWriter,
    path: PathBuf,
    size: (u32, u32),
    bgr: Mat,
    frames: u64,
    finished: bool,
}

impl VideoFileWriter {
    pub fn create(path: &Path, width: u32, height: u32, fps: u32, codec: &str) -> Result<Self, RecorderError> {
        let open_err = |reason: String| RecorderError::Open {
            path: path.to_path_buf(),
            reason,
        };

        let frame_size = Size::new(
            i32::try_from(width).map_err(|_| open_err(format!("width {} too large", width)))?,
            i32::try_from(height).map_err(|_| open_err(format!("height {} too large", height)))?,
        );
        let filename = path
            .to_str()
            .ok_or_else(|| open_err("path is not valid UTF-8".into()))?;

        let writer = VideoWriter::new(filename, fourcc(codec)?, f64::from(fps), frame_size, true)
            .map_err(|e| open_err(e.to_string()))?;
        if !writer.is_opened()? {
            return Err(open_err(format!("no {} encoder available", codec)));
        }

        let bgr = Mat::new_rows_cols_with_default(frame_size.height, frame_size.width, CV_8UC3, Scalar::all(0.0))?;
        debug!("Opened {} ({}x{} @ {} fps, {})", path.display(), width, height, fps, codec);

        Ok(Self {
            writer,
            path: path.to_path_buf(),
            size: (width, height),
            bgr,
            frames: 0,
            finished: false,
        })
    }

    /// Encode one RGB frame
    pub fn write_frame(&mut self, frame: &VideoFrame) -> Result<(), RecorderError> {
        if self.finished {
            return Err(RecorderError::Encode(format!("{} is already finalized", self.path.display())));
        }
        if frame.dimensions() != self.size {
            return Err(RecorderError::DimensionMismatch {
                expected: self.size,
                actual: frame.dimensions(),
            });
        }
        if !frame.is_well_formed() {
            return Err(RecorderError::MalformedFrame {
                expected: frame.expected_len(),
                actual: frame.data.len(),
            });
        }

        let bgr = self.bgr.data_bytes_mut()?;
        for (dst, src) in bgr.chunks_exact_mut(3).zip(frame.data.chunks_exact(3)) {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        }

        self.writer.write(&self.bgr)?;
        self.frames += 1;
        Ok(())
    }

    /// Release the encoder and close the file. Idempotent.
    pub fn finish(&mut self) -> Result<(), RecorderError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.writer.release()?;
        debug!("Released {} after {} frames", self.path.display(), self.frames);
        Ok(())
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}
