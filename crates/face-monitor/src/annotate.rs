//! Frame overlay for recorded video

use camera_capture::frame::VideoFrame;
use image::Rgb;
use imageproc::drawing::{draw_filled_circle_mut, draw_filled_rect_mut};
use imageproc::rect::Rect;

use crate::analysis::{FrameAnalysis, MonitorAlert};
use crate::landmarks::{EyeRegion, LandmarkSet, LOWER_LIP, UPPER_LIP};

const CRYING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const SLEEPING_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

const BADGE_SIZE: u32 = 24;
const BADGE_MARGIN: i32 = 30;

/// Draw alert badges and the tracked eye/mouth points onto the frame.
///
/// Crying gets a red badge at the top left, sleeping a blue one below it.
pub fn annotate(frame: &mut VideoFrame, analysis: &FrameAnalysis, landmarks: Option<&LandmarkSet>) {
    let (width, height) = frame.dimensions();

    frame.with_image_mut(|img| {
        if let Some(landmarks) = landmarks {
            let tracked = EyeRegion::LEFT
                .indices
                .into_iter()
                .chain(EyeRegion::RIGHT.indices)
                .chain([UPPER_LIP, LOWER_LIP]);
            for idx in tracked {
                if let Some(p) = landmarks.get(idx) {
                    let p = p.scaled(width, height);
                    draw_filled_circle_mut(img, (p.x as i32, p.y as i32), 1, LANDMARK_COLOR);
                }
            }
        }

        for (row, alert) in [MonitorAlert::Crying, MonitorAlert::Sleeping].iter().enumerate() {
            if !analysis.alerts.contains(alert) {
                continue;
            }
            let color = match alert {
                MonitorAlert::Crying => CRYING_COLOR,
                MonitorAlert::Sleeping => SLEEPING_COLOR,
            };
            let y = BADGE_MARGIN + row as i32 * (BADGE_SIZE as i32 + BADGE_MARGIN);
            draw_filled_rect_mut(
                img,
                Rect::at(BADGE_MARGIN, y).of_size(BADGE_SIZE, BADGE_SIZE),
                color,
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badges_follow_alerts() {
        let mut frame = VideoFrame::solid(160, 160, [0, 0, 0], 0);
        let analysis = FrameAnalysis {
            face_detected: true,
            sleeping: true,
            alerts: vec![MonitorAlert::Sleeping],
            ..Default::default()
        };

        annotate(&mut frame, &analysis, None);

        // Sleeping badge sits in the second row
        assert_eq!(frame.get_pixel(35, 90), Some([0, 0, 255]));
        // No crying badge
        assert_eq!(frame.get_pixel(35, 35), Some([0, 0, 0]));
    }

    #[test]
    fn test_no_alerts_leaves_frame_untouched() {
        let mut frame = VideoFrame::solid(64, 64, [9, 9, 9], 0);
        let before = frame.data.clone();
        annotate(&mut frame, &FrameAnalysis::default(), None);
        assert_eq!(frame.data, before);
    }
}
