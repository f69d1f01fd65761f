//! Video frame types and conversions

use image::{ImageFormat, RgbImage};

use crate::CameraError;

/// Decoded RGB video frame
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// RGB pixel data (width * height * 3)
    pub data: Vec<u8>,
    /// Frame width
    pub width: u32,
    /// Frame height
    pub height: u32,
    /// Frame sequence number
    pub sequence: u64,
}

impl VideoFrame {
    /// Create a new video frame from raw RGB data
    pub fn new(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            sequence,
        }
    }

    /// Create a frame filled with a single color
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Self {
        let data = rgb
            .iter()
            .copied()
            .cycle()
            .take((width * height * 3) as usize)
            .collect();
        Self::new(data, width, height, sequence)
    }

    /// Frame dimensions as (width, height)
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Byte length of well-formed RGB data for these dimensions
    pub fn expected_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 3
    }

    /// Whether `data` matches the frame dimensions
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.expected_len()
    }

    /// Get pixel at (x, y)
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 3) as usize;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Borrow the pixel data as an `image` buffer view.
    ///
    /// Returns `None` when the data length does not match the dimensions.
    pub fn as_image(&self) -> Option<image::ImageBuffer<image::Rgb<u8>, &[u8]>> {
        image::ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    /// Run `f` over the frame as a mutable `RgbImage`, in place.
    pub fn with_image_mut<F>(&mut self, f: F) -> bool
    where
        F: FnOnce(&mut RgbImage),
    {
        if !self.is_well_formed() {
            return false;
        }
        let data = std::mem::take(&mut self.data);
        match RgbImage::from_raw(self.width, self.height, data) {
            Some(mut img) => {
                f(&mut img);
                self.data = img.into_raw();
                true
            }
            None => false,
        }
    }

    /// Decode a JPEG image into an RGB frame
    pub fn from_jpeg(jpeg: &[u8], sequence: u64) -> Result<Self, CameraError> {
        let img = image::load_from_memory_with_format(jpeg, ImageFormat::Jpeg)
            .map_err(|e| CameraError::Decode(e.to_string()))?;
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();

        Ok(Self {
            data: rgb.into_raw(),
            width,
            height,
            sequence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame_layout() {
        let frame = VideoFrame::solid(4, 2, [10, 20, 30], 7);
        assert_eq!(frame.data.len(), 4 * 2 * 3);
        assert_eq!(frame.get_pixel(3, 1), Some([10, 20, 30]));
        assert_eq!(frame.get_pixel(4, 0), None);
        assert_eq!(frame.dimensions(), (4, 2));
    }

    #[test]
    fn test_with_image_mut_writes_back() {
        let mut frame = VideoFrame::solid(3, 3, [0, 0, 0], 0);
        let ok = frame.with_image_mut(|img| img.put_pixel(1, 1, image::Rgb([255, 0, 0])));
        assert!(ok);
        assert_eq!(frame.get_pixel(1, 1), Some([255, 0, 0]));
        assert_eq!(frame.data.len(), 27);
    }

    #[test]
    fn test_with_image_mut_rejects_bad_length() {
        let mut frame = VideoFrame::new(vec![0; 5], 3, 3, 0);
        assert!(!frame.is_well_formed());
        assert_eq!(frame.expected_len(), 27);
        assert!(!frame.with_image_mut(|_| {}));
    }

    #[test]
    fn test_jpeg_decode() {
        let img = RgbImage::from_pixel(8, 6, image::Rgb([200, 100, 50]));
        let mut jpeg = Vec::new();
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, 90)
            .encode(img.as_raw(), 8, 6, image::ExtendedColorType::Rgb8)
            .unwrap();

        let frame = VideoFrame::from_jpeg(&jpeg, 3).unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.sequence, 3);
    }

    #[test]
    fn test_jpeg_decode_garbage() {
        assert!(matches!(
            VideoFrame::from_jpeg(&[0xFF, 0xD8, 0x00], 0),
            Err(CameraError::Decode(_))
        ));
    }
}
