//! Face landmark estimators

use camera_capture::frame::VideoFrame;
use image::{GenericImageView, Rgb};
use tracing::{debug, info, warn};

use crate::face_detector::{CropRect, FaceBox, FaceDetector};
use crate::landmarks::{LandmarkSet, Point, FACE_MESH_POINTS};
use crate::model::{self, OnnxModel};
use crate::{EstimatorConfig, MonitorError};

/// Face mesh model input edge (pixels)
const MESH_INPUT: usize = 192;

/// Crop edge relative to the longer side of the face box
const ROI_SCALE: f32 = 1.5;

/// Produces the landmark set of the single monitored face, if any
pub trait LandmarkEstimator {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, MonitorError>;
}

impl<E: LandmarkEstimator + ?Sized> LandmarkEstimator for Box<E> {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, MonitorError> {
        (**self).detect(frame)
    }
}

/// Estimator used when no model is configured: never sees a face
#[derive(Debug, Default)]
pub struct NullEstimator {
    warned: bool,
}

impl LandmarkEstimator for NullEstimator {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<LandmarkSet>, MonitorError> {
        if !self.warned {
            warn!("No face mesh model configured; frames are recorded without analysis");
            self.warned = true;
        }
        Ok(None)
    }
}

/// Two-stage face mesh estimator
///
/// A BlazeFace detector finds the face; the face mesh model then runs on
/// a square crop around it (1x192x192x3 input in [0, 1], outputs N x 3
/// landmarks in crop pixels plus a face presence logit). While presence
/// stays at or above the tracking confidence, the next frame is cropped
/// around the previous landmarks and the detector is skipped.
pub struct FaceMeshEstimator {
    detector: FaceDetector,
    mesh: OnnxModel,
    tracking_confidence: f32,
    tracked: Option<FaceBox>,
}

impl FaceMeshEstimator {
    pub fn new(config: &EstimatorConfig) -> Result<Self, MonitorError> {
        let mesh_path = config
            .mesh_model_path
            .as_deref()
            .ok_or_else(|| MonitorError::Config("estimator.mesh_model_path is not set".into()))?;
        let detector_path = config.detector_model_path.as_deref().ok_or_else(|| {
            MonitorError::Config("estimator.detector_model_path is required with a mesh model".into())
        })?;

        let detector = FaceDetector::new(detector_path, config.detection_confidence)?;
        info!("Loading face mesh model from {}", mesh_path);
        let mesh = model::load(mesh_path, MESH_INPUT)?;

        Ok(Self {
            detector,
            mesh,
            tracking_confidence: config.tracking_confidence,
            tracked: None,
        })
    }

    /// Build an estimator from config, falling back to [`NullEstimator`]
    pub fn from_config(config: &EstimatorConfig) -> Result<Box<dyn LandmarkEstimator + Send>, MonitorError> {
        match config.mesh_model_path {
            Some(_) => Ok(Box::new(Self::new(config)?)),
            None => Ok(Box::new(NullEstimator::default())),
        }
    }

    /// Run the mesh on the crop around `face`
    fn landmarks_in<I>(&self, img: &I, face: &FaceBox) -> Result<Option<LandmarkSet>, MonitorError>
    where
        I: GenericImageView<Pixel = Rgb<u8>>,
    {
        let (width, height) = img.dimensions();
        let Some(roi) = face.roi(width, height, ROI_SCALE) else {
            debug!("Face box {:?} lies outside the frame", face);
            return Ok(None);
        };

        let crop = image::imageops::crop_imm(img, roi.x, roi.y, roi.width, roi.height);
        let input = model::image_tensor(&*crop, MESH_INPUT, |v| v as f32 / 255.0);
        let outputs = model::run(&self.mesh, input)?;

        let coords = outputs
            .iter()
            .find(|o| o.len() >= FACE_MESH_POINTS * 3 && o.len() % 3 == 0)
            .ok_or_else(|| MonitorError::Inference("model produced no landmark tensor".into()))?;
        let presence = outputs
            .iter()
            .find(|o| o.len() == 1)
            .map(|o| model::sigmoid(o[0]))
            .unwrap_or(1.0);

        if presence < self.tracking_confidence {
            debug!(
                "Face presence {:.2} below tracking confidence {:.2}",
                presence, self.tracking_confidence
            );
            return Ok(None);
        }

        Ok(Some(LandmarkSet::new(mesh_points(coords, &roi, width, height))?))
    }
}

/// Convert mesh output (crop input pixels) to frame-normalized points
fn mesh_points(coords: &[f32], roi: &CropRect, frame_width: u32, frame_height: u32) -> Vec<Point> {
    let edge = MESH_INPUT as f64;
    coords
        .chunks_exact(3)
        .map(|c| {
            let in_crop = Point::new(c[0] as f64 / edge, c[1] as f64 / edge);
            roi.to_frame(in_crop, frame_width, frame_height)
        })
        .collect()
}

impl LandmarkEstimator for FaceMeshEstimator {
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkSet>, MonitorError> {
        let img = frame
            .as_image()
            .ok_or_else(|| MonitorError::ImageProcessing("Failed to create image buffer".into()))?;

        if let Some(face) = self.tracked.take() {
            if let Some(landmarks) = self.landmarks_in(&img, &face)? {
                self.tracked = Some(FaceBox::around(&landmarks));
                return Ok(Some(landmarks));
            }
            debug!("Lost tracked face, running detector");
        }

        let Some(face) = self.detector.detect(&img)? else {
            return Ok(None);
        };
        let landmarks = self.landmarks_in(&img, &face)?;
        self.tracked = landmarks.as_ref().map(FaceBox::around);
        Ok(landmarks)
    }
}
