//! Face detection stage (BlazeFace short-range)
//!
//! Finds the single most confident face in a frame. The box seeds the
//! crop the face mesh runs on; once the mesh has landmarks, the next
//! frame's crop comes from them instead.

use image::{GenericImageView, Rgb};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::landmarks::{LandmarkSet, Point};
use crate::model::{self, OnnxModel};
use crate::MonitorError;

/// Detector input edge (pixels)
const DETECTOR_INPUT: usize = 128;
/// Anchors of the short-range model: 16x16x2 at stride 8, 8x8x6 at stride 16
const ANCHOR_COUNT: usize = 896;
/// Regressor values per anchor: box (4) + 6 keypoints (12)
const BOX_VALUES: usize = 16;

/// Face bounding box, normalized to frame coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Pixel rectangle cut from a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    /// Square crop around the box center, `scale` times its longer side,
    /// clamped to the frame. `None` if nothing of it lies inside the frame.
    pub fn roi(&self, frame_width: u32, frame_height: u32, scale: f32) -> Option<CropRect> {
        let (fw, fh) = (frame_width as f32, frame_height as f32);
        let cx = (self.x + self.width / 2.0) * fw;
        let cy = (self.y + self.height / 2.0) * fh;
        let half = (self.width * fw).max(self.height * fh) * scale / 2.0;
        if !(cx.is_finite() && cy.is_finite() && half.is_finite() && half > 0.0) {
            return None;
        }

        let x0 = (cx - half).round().clamp(0.0, fw);
        let y0 = (cy - half).round().clamp(0.0, fh);
        let x1 = (cx + half).round().clamp(0.0, fw);
        let y1 = (cy + half).round().clamp(0.0, fh);
        if x1 - x0 < 1.0 || y1 - y0 < 1.0 {
            return None;
        }

        Some(CropRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    /// Bounding box of a landmark set
    pub fn around(landmarks: &LandmarkSet) -> FaceBox {
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in landmarks.points() {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }

        FaceBox {
            x: min_x as f32,
            y: min_y as f32,
            width: (max_x - min_x) as f32,
            height: (max_y - min_y) as f32,
            confidence: 1.0,
        }
    }
}

impl CropRect {
    /// Map a point normalized to this crop into frame-normalized coordinates
    pub fn to_frame(&self, p: Point, frame_width: u32, frame_height: u32) -> Point {
        Point::new(
            (self.x as f64 + p.x * self.width as f64) / frame_width as f64,
            (self.y as f64 + p.y * self.height as f64) / frame_height as f64,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    cx: f32,
    cy: f32,
}

fn anchors() -> Vec<Anchor> {
    let mut anchors = Vec::with_capacity(ANCHOR_COUNT);
    for (stride, per_cell) in [(8usize, 2usize), (16, 6)] {
        let cells = DETECTOR_INPUT / stride;
        for y in 0..cells {
            for x in 0..cells {
                let anchor = Anchor {
                    cx: (x as f32 + 0.5) / cells as f32,
                    cy: (y as f32 + 0.5) / cells as f32,
                };
                anchors.extend(std::iter::repeat(anchor).take(per_cell));
            }
        }
    }
    anchors
}

/// Pick the best-scoring anchor at or above `threshold` and decode its box
fn decode(regressors: &[f32], scores: &[f32], anchors: &[Anchor], threshold: f32) -> Option<FaceBox> {
    let (index, confidence, anchor) = scores
        .iter()
        .zip(anchors)
        .enumerate()
        .map(|(i, (&raw, anchor))| (i, model::sigmoid(raw.clamp(-100.0, 100.0)), anchor))
        .filter(|(_, score, _)| *score >= threshold)
        .max_by(|a, b| a.1.total_cmp(&b.1))?;

    let r = regressors.get(index * BOX_VALUES..index * BOX_VALUES + 4)?;
    let size = DETECTOR_INPUT as f32;
    let cx = anchor.cx + r[0] / size;
    let cy = anchor.cy + r[1] / size;
    let width = r[2] / size;
    let height = r[3] / size;

    Some(FaceBox {
        x: cx - width / 2.0,
        y: cy - height / 2.0,
        width,
        height,
        confidence,
    })
}

/// BlazeFace detector running an ONNX model with tract
///
/// Expects a 1x128x128x3 input in [-1, 1] and two outputs: 896x16 box
/// regressors and 896 score logits.
pub struct FaceDetector {
    model: OnnxModel,
    anchors: Vec<Anchor>,
    confidence: f32,
}

impl FaceDetector {
    pub fn new(path: &str, confidence: f32) -> Result<Self, MonitorError> {
        info!("Loading face detection model from {}", path);
        Ok(Self {
            model: model::load(path, DETECTOR_INPUT)?,
            anchors: anchors(),
            confidence,
        })
    }

    /// Most confident face scoring at least the detection confidence
    pub fn detect<I>(&self, img: &I) -> Result<Option<FaceBox>, MonitorError>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let input = model::image_tensor(img, DETECTOR_INPUT, |v| v as f32 / 127.5 - 1.0);
        let outputs = model::run(&self.model, input)?;

        let regressors = outputs
            .iter()
            .find(|o| o.len() == ANCHOR_COUNT * BOX_VALUES)
            .ok_or_else(|| MonitorError::Inference("detector produced no box regressors".into()))?;
        let scores = outputs
            .iter()
            .find(|o| o.len() == ANCHOR_COUNT)
            .ok_or_else(|| MonitorError::Inference("detector produced no scores".into()))?;

        let face = decode(regressors, scores, &self.anchors, self.confidence);
        match &face {
            Some(face) => debug!("Face detected (score {:.2})", face.confidence),
            None => debug!("No face scoring at least {:.2}", self.confidence),
        }
        Ok(face)
    }
}
