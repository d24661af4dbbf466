//! CPU-side frame preparation: everything written into a ring slot, built as
//! a pure function of the tracked frame and the current controls.

use crate::{
    camera::Orientation,
    cutoff::{anchor_window, frame_cutoff},
    tracking::TrackedFrame,
    uniforms::{InstanceUniforms, SharedUniforms},
};
use glam::{Mat4, UVec2, Vec3};
use std::{
    collections::VecDeque,
    ops::Range,
    time::{Duration, Instant},
};

pub const AMBIENT_LIGHT_COLOR: Vec3 = Vec3::splat(0.5);
pub const DIRECTIONAL_LIGHT_DIRECTION: Vec3 = Vec3::new(0.0, 0.0, -1.0);
pub const DIRECTIONAL_LIGHT_COLOR: Vec3 = Vec3::splat(0.6);
pub const MATERIAL_SHININESS: f32 = 0.0;

/// Ambient intensity (lumens) that leaves the static light colours unchanged.
pub const NEUTRAL_LIGHT_INTENSITY: f32 = 1000.0;

/// How light colours are chosen each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightingMode {
    /// Fixed ambient and directional colours.
    #[default]
    Static,
    /// Static colours scaled by the frame's ambient intensity estimate.
    Estimated,
}

/// Converts right-handed anchor space into the mesh's left-handed space.
pub fn flip_z() -> Mat4 {
    Mat4::from_scale(Vec3::new(1.0, 1.0, -1.0))
}

/// Everything written into one ring slot.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameUniforms {
    pub shared: SharedUniforms,
    pub instances: Vec<InstanceUniforms>,
    /// Which of the frame's anchors the instances came from.
    pub anchor_window: Range<usize>,
}

/// Builds the shared and per-anchor uniforms for one frame.
pub fn build_frame_uniforms(
    frame: &TrackedFrame,
    orientation: Orientation,
    viewport: UVec2,
    mix_factor: f32,
    lighting: LightingMode,
) -> FrameUniforms {
    let view = frame.camera.view_matrix(orientation);
    let projection = frame.camera.projection_matrix(orientation, viewport);

    let scale = match (lighting, frame.light_estimate) {
        (LightingMode::Estimated, Some(estimate)) => {
            (estimate.ambient_intensity / NEUTRAL_LIGHT_INTENSITY).max(0.0)
        }
        _ => 1.0,
    };

    let window = anchor_window(frame.anchors.len());
    let flip = flip_z();
    let instances = frame.anchors[window.clone()]
        .iter()
        .map(|anchor| InstanceUniforms {
            model: (anchor.transform * flip).to_cols_array_2d(),
        })
        .collect();

    let shared = SharedUniforms {
        projection: projection.to_cols_array_2d(),
        view: view.to_cols_array_2d(),
        ambient_light_color: (AMBIENT_LIGHT_COLOR * scale).to_array(),
        material_shininess: MATERIAL_SHININESS,
        directional_light_direction: DIRECTIONAL_LIGHT_DIRECTION.normalize().to_array(),
        cutoff_distance: frame_cutoff(&view, &frame.anchors),
        directional_light_color: (DIRECTIONAL_LIGHT_COLOR * scale).to_array(),
        mix_factor: mix_factor.clamp(0.0, 1.0),
    };

    FrameUniforms {
        shared,
        instances,
        anchor_window: window,
    }
}

/// Running counters of rendered and skipped frames.
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    pub rendered: u64,
    pub skipped_no_frame: u64,
    pub skipped_textures: u64,
    pub skipped_no_drawable: u64,
    recent: VecDeque<Instant>,
}

const FPS_WINDOW: Duration = Duration::from_secs(1);

impl FrameStats {
    pub fn record_rendered(&mut self, now: Instant) {
        self.rendered += 1;
        self.recent.push_back(now);
        while let Some(&oldest) = self.recent.front() {
            if now.duration_since(oldest) > FPS_WINDOW {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn skipped(&self) -> u64 {
        self.skipped_no_frame + self.skipped_textures + self.skipped_no_drawable
    }

    /// Frames rendered during the last second.
    pub fn fps(&self) -> f32 {
        match (self.recent.front(), self.recent.back()) {
            (Some(first), Some(last)) if self.recent.len() > 1 => {
                let span = last.duration_since(*first).as_secs_f32();
                if span > 0.0 {
                    (self.recent.len() - 1) as f32 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}
