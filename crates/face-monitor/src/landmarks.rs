//! Face mesh landmark schema
//!
//! Landmarks use the 468-point face mesh index scheme (478 with refined
//! iris points). Coordinates are normalized to [0, 1] of the frame.

use serde::{Deserialize, Serialize};

use crate::MonitorError;

/// Number of points in the base face mesh
pub const FACE_MESH_POINTS: usize = 468;

/// Number of points with refined iris landmarks
pub const REFINED_FACE_MESH_POINTS: usize = 478;

/// Upper inner lip
pub const UPPER_LIP: usize = 13;

/// Lower inner lip
pub const LOWER_LIP: usize = 14;

/// 2-D point, normalized or in pixels depending on context
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Scale a normalized point to pixel space
    pub fn scaled(self, width: u32, height: u32) -> Self {
        Self {
            x: self.x * width as f64,
            y: self.y * height as f64,
        }
    }
}

/// Six landmark indices outlining one eye.
///
/// Order: outer corner, upper 1, upper 2, inner corner, lower 2, lower 1,
/// so that (1, 5) and (2, 4) are the vertical pairs and (0, 3) the
/// horizontal one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeRegion {
    pub name: &'static str,
    pub indices: [usize; 6],
}

impl EyeRegion {
    pub const LEFT: EyeRegion = EyeRegion {
        name: "left",
        indices: [362, 385, 387, 263, 373, 380],
    };

    pub const RIGHT: EyeRegion = EyeRegion {
        name: "right",
        indices: [33, 160, 158, 133, 153, 144],
    };
}

/// Landmarks of one detected face for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    /// Validate and wrap estimator output
    pub fn new(points: Vec<Point>) -> Result<Self, MonitorError> {
        if points.len() < FACE_MESH_POINTS {
            return Err(MonitorError::InvalidLandmarks(format!(
                "expected at least {} points, got {}",
                FACE_MESH_POINTS,
                points.len()
            )));
        }
        if let Some(i) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(MonitorError::InvalidLandmarks(format!(
                "point {} is not finite",
                i
            )));
        }
        Ok(Self { points })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Point at a mesh index. Indices below `FACE_MESH_POINTS` always exist.
    pub fn get(&self, index: usize) -> Option<Point> {
        self.points.get(index).copied()
    }

    /// The six points of an eye, in region order
    pub fn eye(&self, region: &EyeRegion) -> [Point; 6] {
        region.indices.map(|i| self.points[i])
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_short_sets() {
        let err = LandmarkSet::new(vec![Point::default(); 10]).unwrap_err();
        assert!(matches!(err, MonitorError::InvalidLandmarks(_)));
    }

    #[test]
    fn test_rejects_non_finite() {
        let mut points = vec![Point::new(0.5, 0.5); FACE_MESH_POINTS];
        points[42].y = f64::NAN;
        assert!(LandmarkSet::new(points).is_err());
    }

    #[test]
    fn test_accepts_refined_mesh() {
        let set = LandmarkSet::new(vec![Point::new(0.1, 0.2); REFINED_FACE_MESH_POINTS]).unwrap();
        assert_eq!(set.len(), 478);
        assert_eq!(set.eye(&EyeRegion::LEFT)[0], Point::new(0.1, 0.2));
    }

    #[test]
    fn test_eye_regions_fit_base_mesh() {
        for region in [EyeRegion::LEFT, EyeRegion::RIGHT] {
            assert!(region.indices.iter().all(|&i| i < FACE_MESH_POINTS));
        }
        assert!(UPPER_LIP < FACE_MESH_POINTS && LOWER_LIP < FACE_MESH_POINTS);
    }
}
