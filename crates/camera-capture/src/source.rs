//! Frame sources

use std::io::Read;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{CameraConfig, CameraError, VideoFrame};

const SOI: [u8; 2] = [0xFF, 0xD8];
const EOI: [u8; 2] = [0xFF, 0xD9];
const READ_CHUNK: usize = 16 * 1024;

/// A blocking producer of frames.
///
/// `fetch_frame` blocks until a frame is available or reports a failure.
/// Failures are transient: callers retry on the next pass.
pub trait FrameSource {
    fn fetch_frame(&mut self) -> Result<VideoFrame, CameraError>;
}

/// MJPEG over HTTP camera source
///
/// Connects lazily, extracts JPEG images from the multipart byte stream by
/// SOI/EOI markers and decodes each one to RGB. Any stream error drops the
/// connection; the next fetch reconnects.
pub struct MjpegStreamSource {
    config: CameraConfig,
    client: reqwest::blocking::Client,
    stream: Option<Box<dyn Read + Send>>,
    scanner: JpegScanner,
    sequence: u64,
}

impl MjpegStreamSource {
    pub fn new(config: CameraConfig) -> Result<Self, CameraError> {
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(None::<Duration>)
            .build()
            .map_err(|e| CameraError::Open(e.to_string()))?;

        Ok(Self {
            scanner: JpegScanner::new(config.max_frame_bytes),
            config,
            client,
            stream: None,
            sequence: 0,
        })
    }

    fn connect(&mut self) -> Result<(), CameraError> {
        info!("Connecting to camera stream {}", self.config.url);
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| CameraError::Open(e.to_string()))?;

        self.scanner.clear();
        self.stream = Some(Box::new(response));
        Ok(())
    }

    fn next_jpeg(&mut self) -> Result<Vec<u8>, CameraError> {
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            if let Some(jpeg) = self.scanner.next_image() {
                return Ok(jpeg);
            }

            let stream = self.stream.as_mut().ok_or(CameraError::EndOfStream)?;
            let n = stream
                .read(&mut chunk)
                .map_err(|e| CameraError::Stream(e.to_string()))?;
            if n == 0 {
                return Err(CameraError::EndOfStream);
            }
            self.scanner.push(&chunk[..n])?;
        }
    }
}

impl FrameSource for MjpegStreamSource {
    fn fetch_frame(&mut self) -> Result<VideoFrame, CameraError> {
        if self.stream.is_none() {
            self.connect()?;
        }

        let jpeg = match self.next_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                warn!("Dropping camera connection: {}", e);
                self.stream = None;
                return Err(e);
            }
        };

        let frame = VideoFrame::from_jpeg(&jpeg, self.sequence)?;
        self.sequence += 1;
        debug!(
            "Fetched frame #{} ({}x{}, {} bytes)",
            frame.sequence,
            frame.width,
            frame.height,
            jpeg.len()
        );
        Ok(frame)
    }
}

/// Incremental JPEG extractor for multipart MJPEG streams
#[derive(Debug)]
struct JpegScanner {
    buffer: Vec<u8>,
    max_bytes: usize,
}

impl JpegScanner {
    fn new(max_bytes: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(READ_CHUNK * 4),
            max_bytes,
        }
    }

    fn clear(&mut self) {
        self.buffer.clear();
    }

    fn push(&mut self, bytes: &[u8]) -> Result<(), CameraError> {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() > self.max_bytes {
            let len = self.buffer.len();
            self.buffer.clear();
            return Err(CameraError::Stream(format!(
                "no complete JPEG within {} buffered bytes",
                len
            )));
        }
        Ok(())
    }

    /// Pop the next complete JPEG, discarding any bytes before it.
    fn next_image(&mut self) -> Option<Vec<u8>> {
        let start = find_marker(&self.buffer, SOI, 0)?;
        let end = find_marker(&self.buffer, EOI, start + 2)? + 2;

        let jpeg = self.buffer[start..end].to_vec();
        self.buffer.drain(..end);
        Some(jpeg)
    }
}

fn find_marker(haystack: &[u8], marker: [u8; 2], from: usize) -> Option<usize> {
    haystack
        .get(from..)?
        .windows(2)
        .position(|w| w == marker)
        .map(|p| p + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_jpeg(payload: &[u8]) -> Vec<u8> {
        let mut v = SOI.to_vec();
        v.extend_from_slice(payload);
        v.extend_from_slice(&EOI);
        v
    }

    #[test]
    fn test_scanner_extracts_multipart_images() {
        let mut scanner = JpegScanner::new(1024);
        let mut stream = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n".to_vec();
        stream.extend(fake_jpeg(b"one"));
        stream.extend_from_slice(b"\r\n--frame\r\n\r\n");
        stream.extend(fake_jpeg(b"two"));

        scanner.push(&stream).unwrap();
        assert_eq!(scanner.next_image(), Some(fake_jpeg(b"one")));
        assert_eq!(scanner.next_image(), Some(fake_jpeg(b"two")));
        assert_eq!(scanner.next_image(), None);
    }

    #[test]
    fn test_scanner_waits_for_eoi_across_chunks() {
        let mut scanner = JpegScanner::new(1024);
        let jpeg = fake_jpeg(b"split-payload");
        let (a, b) = jpeg.split_at(5);

        scanner.push(a).unwrap();
        assert_eq!(scanner.next_image(), None);
        scanner.push(b).unwrap();
        assert_eq!(scanner.next_image(), Some(jpeg));
    }

    #[test]
    fn test_scanner_overflow_discards_buffer() {
        let mut scanner = JpegScanner::new(8);
        assert!(scanner.push(&[0u8; 16]).is_err());
        assert!(scanner.buffer.is_empty());
    }

    #[test]
    fn test_find_marker_offset() {
        let data = [0x00, 0xFF, 0xD8, 0xFF, 0xD9];
        assert_eq!(find_marker(&data, SOI, 0), Some(1));
        assert_eq!(find_marker(&data, EOI, 3), Some(3));
        assert_eq!(find_marker(&data, SOI, 10), None);
    }
}
