//! Depth cutoff heuristic and the anchor window it is evaluated on.
//!
//! The cutoff is the eye-space distance of the primary anchor plus an offset.
//! A camera looking down (view `[1][2]` above 0.33) at an anchor more than
//! 0.1 below it gets the far offset so a seated or low subject keeps its
//! body; otherwise the near offset tightens the cut around a face.

use crate::{tracking::Anchor, uniforms::MAX_ANCHOR_INSTANCES};
use glam::Mat4;
use std::ops::Range;

pub const UPWARD_THRESHOLD: f32 = 0.33;
pub const HEIGHT_DELTA_THRESHOLD: f32 = 0.1;
pub const NEAR_OFFSET: f32 = 0.15;
pub const FAR_OFFSET: f32 = 1.0;

/// Cutoff used when no anchor is tracked: every valid depth is subject.
pub const NO_CUTOFF: f32 = f32::MAX;

/// Offset chosen by the looking-down heuristic.
pub fn cutoff_offset(view: &Mat4, anchor: &Mat4) -> f32 {
    let upward = view.col(1).z;
    let height_delta = view.col(3).y - anchor.col(3).y;
    if upward > UPWARD_THRESHOLD && height_delta > HEIGHT_DELTA_THRESHOLD {
        FAR_OFFSET
    } else {
        NEAR_OFFSET
    }
}

/// Cutoff distance for one anchor under the given view matrix.
pub fn cutoff_distance(view: &Mat4, anchor: &Mat4) -> f32 {
    let model_view = *view * *anchor;
    -model_view.col(3).z + cutoff_offset(view, anchor)
}

/// Indices of the anchors that get rendered: the newest
/// [`MAX_ANCHOR_INSTANCES`] of `len`.
pub fn anchor_window(len: usize) -> Range<usize> {
    len.saturating_sub(MAX_ANCHOR_INSTANCES)..len
}

/// Cutoff for a frame, evaluated on the first anchor of the rendered window.
pub fn frame_cutoff(view: &Mat4, anchors: &[Anchor]) -> f32 {
    anchors
        .get(anchor_window(anchors.len()).start)
        .map_or(NO_CUTOFF, |a| cutoff_distance(view, &a.transform))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};

    /// A view matrix whose `[1][2]` and `[3][1]` entries are set directly.
    fn view_with(upward: f32, height: f32, depth: f32) -> Mat4 {
        Mat4::from_cols(
            Vec4::X,
            Vec4::new(0.0, 1.0, upward, 0.0),
            Vec4::Z,
            Vec4::new(0.0, height, depth, 1.0),
        )
    }

    fn anchor_at(y: f32) -> Mat4 {
        Mat4::from_translation(Vec3::new(0.0, y, 0.0))
    }

    #[test]
    fn test_cutoff_quadrants() {
        let anchor = anchor_at(0.0);
        // upward above, delta above -> far
        assert_eq!(cutoff_offset(&view_with(0.5, 0.5, 0.0), &anchor), FAR_OFFSET);
        // upward above, delta below -> near
        assert_eq!(cutoff_offset(&view_with(0.5, 0.05, 0.0), &anchor), NEAR_OFFSET);
        // upward below, delta above -> near
        assert_eq!(cutoff_offset(&view_with(0.2, 0.5, 0.0), &anchor), NEAR_OFFSET);
        // upward below, delta below -> near
        assert_eq!(cutoff_offset(&view_with(0.2, 0.05, 0.0), &anchor), NEAR_OFFSET);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let anchor = anchor_at(0.0);
        assert_eq!(cutoff_offset(&view_with(0.33, 0.5, 0.0), &anchor), NEAR_OFFSET);
        assert_eq!(cutoff_offset(&view_with(0.331, 0.5, 0.0), &anchor), FAR_OFFSET);
        assert_eq!(cutoff_offset(&view_with(0.5, 0.1, 0.0), &anchor), NEAR_OFFSET);
        assert_eq!(cutoff_offset(&view_with(0.5, 0.11, 0.0), &anchor), FAR_OFFSET);
    }

    #[test]
    fn test_cutoff_distance_hand_computed() {
        // Camera 2m along +Z looking down -Z; anchor at the origin.
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 2.0), Vec3::ZERO, Vec3::Y);
        let anchor = anchor_at(0.0);
        let expected = 2.0 + NEAR_OFFSET;
        assert!((cutoff_distance(&view, &anchor) - expected).abs() < 1e-5);

        // Deterministic for identical inputs.
        assert_eq!(
            cutoff_distance(&view, &anchor).to_bits(),
            cutoff_distance(&view, &anchor).to_bits()
        );
    }

    #[test]
    fn test_cutoff_looking_down_at_low_anchor() {
        // Camera pitched down past an anchor a metre below the origin.
        let eye = Vec3::new(0.0, 1.5, 1.0);
        let target = Vec3::new(0.0, 0.0, -1.0);
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let anchor = anchor_at(-1.0);
        assert!(view.col(1).z > UPWARD_THRESHOLD);
        assert!(view.col(3).y - anchor.col(3).y > HEIGHT_DELTA_THRESHOLD);

        let forward = (target - eye).normalize();
        let expected = (Vec3::new(0.0, -1.0, 0.0) - eye).dot(forward) + FAR_OFFSET;
        assert!((cutoff_distance(&view, &anchor) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_anchor_window_drops_oldest() {
        assert_eq!(anchor_window(0), 0..0);
        assert_eq!(anchor_window(10), 0..10);
        assert_eq!(anchor_window(64), 0..64);
        assert_eq!(anchor_window(100), 36..100);
        for n in [0usize, 1, 63, 64, 65, 200] {
            assert_eq!(anchor_window(n).len(), n.min(MAX_ANCHOR_INSTANCES));
        }
    }

    #[test]
    fn test_frame_cutoff_uses_window_start() {
        let view = Mat4::IDENTITY;
        assert_eq!(frame_cutoff(&view, &[]), NO_CUTOFF);

        let anchors: Vec<Anchor> = (0..70)
            .map(|i| Anchor {
                id: i,
                transform: Mat4::from_translation(Vec3::new(0.0, 0.0, -(i as f32))),
            })
            .collect();
        // Window starts at index 6, which sits 6m in front of the camera.
        let expected = 6.0 + NEAR_OFFSET;
        assert!((frame_cutoff(&view, &anchors) - expected).abs() < 1e-5);
    }
}
