//! Geometric metrics over landmark points

use thiserror::Error;

use crate::landmarks::{EyeRegion, LandmarkSet, Point, LOWER_LIP, UPPER_LIP};

#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum MetricError {
    /// Eye corners coincide; the ratio is undefined
    #[error("Degenerate eye geometry: horizontal distance {horizontal}")]
    DegenerateGeometry { horizontal: f64 },
}

/// Horizontal eye widths below this are treated as coincident corners
const MIN_HORIZONTAL_PX: f64 = 1e-6;

/// Euclidean distance between two points
pub fn distance(p1: Point, p2: Point) -> f64 {
    (p1.x - p2.x).hypot(p1.y - p2.y)
}

/// Eye aspect ratio computed on the six eye points in pixel space.
///
/// (|p1 - p5| + |p2 - p4|) / (2 |p0 - p3|)
pub fn eye_aspect_ratio(pts: &[Point; 6]) -> Result<f64, MetricError> {
    let a = distance(pts[1], pts[5]);
    let b = distance(pts[2], pts[4]);
    let c = distance(pts[0], pts[3]);

    if c < MIN_HORIZONTAL_PX {
        return Err(MetricError::DegenerateGeometry { horizontal: c });
    }
    Ok((a + b) / (2.0 * c))
}

/// Openness ratio of one eye, with landmarks scaled to the frame size
pub fn eye_openness(
    landmarks: &LandmarkSet,
    eye: &EyeRegion,
    width: u32,
    height: u32,
) -> Result<f64, MetricError> {
    let pts = landmarks.eye(eye).map(|p| p.scaled(width, height));
    eye_aspect_ratio(&pts)
}

/// Pixel distance between the inner upper and lower lip.
///
/// Not normalized: the value grows with frame resolution and shrinks with
/// distance from the camera.
pub fn mouth_gap(landmarks: &LandmarkSet, width: u32, height: u32) -> f64 {
    let points = landmarks.points();
    distance(
        points[UPPER_LIP].scaled(width, height),
        points[LOWER_LIP].scaled(width, height),
    )
}
