//! Camera math: orientation handling, view and projection matrices built from
//! pinhole intrinsics, and the aspect-fill display transform that maps the
//! viewport onto the captured image.
//!
//! Conventions: camera space is right-handed with +Y up and the camera
//! looking down -Z while the device is in its native (landscape right)
//! orientation. Normalized image coordinates run from (0, 0) at the top-left
//! of the sensor image to (1, 1) at the bottom-right. Clip-space depth is
//! `[0, 1]` as wgpu expects.

use glam::{Affine2, Mat4, UVec2, Vec2, Vec4};
use std::{f32::consts::FRAC_PI_2, fmt, str::FromStr};
use thiserror::Error;

/// Near clipping plane in metres.
pub const Z_NEAR: f32 = 0.01;
/// Far clipping plane in metres.
pub const Z_FAR: f32 = 1000.0;

/// Interface orientation of the display relative to the camera sensor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Orientation {
    /// The sensor's native orientation.
    LandscapeRight,
    #[default]
    Portrait,
    LandscapeLeft,
    PortraitUpsideDown,
}

impl Orientation {
    pub const ALL: [Orientation; 4] = [
        Orientation::LandscapeRight,
        Orientation::Portrait,
        Orientation::LandscapeLeft,
        Orientation::PortraitUpsideDown,
    ];

    /// Counter-clockwise quarter turns from the sensor orientation.
    pub fn quarter_turns(self) -> u32 {
        match self {
            Orientation::LandscapeRight => 0,
            Orientation::Portrait => 1,
            Orientation::LandscapeLeft => 2,
            Orientation::PortraitUpsideDown => 3,
        }
    }

    pub fn angle(self) -> f32 {
        self.quarter_turns() as f32 * FRAC_PI_2
    }

    /// True when the displayed image is the sensor image turned on its side.
    pub fn swaps_axes(self) -> bool {
        self.quarter_turns() % 2 == 1
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Orientation::LandscapeRight => "landscape-right",
            Orientation::Portrait => "portrait",
            Orientation::LandscapeLeft => "landscape-left",
            Orientation::PortraitUpsideDown => "portrait-upside-down",
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown orientation '{0}'")]
pub struct ParseOrientationError(String);

impl FromStr for Orientation {
    type Err = ParseOrientationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase().replace('_', "-");
        Orientation::ALL
            .into_iter()
            .find(|o| o.as_str() == needle)
            .ok_or_else(|| ParseOrientationError(s.to_owned()))
    }
}

/// Pinhole intrinsics in pixels of the captured image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

impl Intrinsics {
    /// Intrinsics with a centred principal point for the given horizontal
    /// field of view (radians) and image size.
    pub fn from_fov(horizontal_fov: f32, resolution: UVec2) -> Self {
        let w = resolution.x.max(1) as f32;
        let h = resolution.y.max(1) as f32;
        let f = 0.5 * w / (0.5 * horizontal_fov).tan();
        Self {
            fx: f,
            fy: f,
            cx: 0.5 * w,
            cy: 0.5 * h,
        }
    }
}

/// Camera pose and calibration for one tracked frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraState {
    /// Camera-to-world transform.
    pub transform: Mat4,
    pub intrinsics: Intrinsics,
    /// Size of the captured image in pixels (sensor orientation).
    pub image_resolution: UVec2,
}

impl CameraState {
    /// World-to-eye transform for the given interface orientation.
    pub fn view_matrix(&self, orientation: Orientation) -> Mat4 {
        (self.transform * Mat4::from_rotation_z(orientation.angle())).inverse()
    }

    /// Half extents of the viewport footprint on the `z = -1` plane of eye
    /// space when the image aspect-fills a viewport of `viewport` pixels.
    fn fill_extents(&self, orientation: Orientation, viewport: UVec2) -> Vec2 {
        let res = self.image_resolution.max(UVec2::ONE).as_vec2();
        let k = self.intrinsics;
        let sensor = Vec2::new(0.5 * res.x / k.fx, 0.5 * res.y / k.fy);
        let image = if orientation.swaps_axes() {
            Vec2::new(sensor.y, sensor.x)
        } else {
            sensor
        };

        let aspect = viewport.x.max(1) as f32 / viewport.y.max(1) as f32;
        let sy = image.y.min(image.x / aspect);
        Vec2::new(sy * aspect, sy)
    }

    /// Perspective projection matching the aspect-filled camera image.
    pub fn projection_matrix(&self, orientation: Orientation, viewport: UVec2) -> Mat4 {
        let s = self.fill_extents(orientation, viewport);
        let a = Z_FAR / (Z_NEAR - Z_FAR);
        let b = Z_NEAR * Z_FAR / (Z_NEAR - Z_FAR);
        Mat4::from_cols(
            Vec4::new(1.0 / s.x, 0.0, 0.0, 0.0),
            Vec4::new(0.0, 1.0 / s.y, 0.0, 0.0),
            Vec4::new(0.0, 0.0, a, -1.0),
            Vec4::new(0.0, 0.0, b, 0.0),
        )
    }

    /// Maps normalized image coordinates to normalized viewport coordinates.
    pub fn display_transform(&self, orientation: Orientation, viewport: UVec2) -> Affine2 {
        self.viewport_to_image(orientation, viewport).inverse()
    }

    /// Maps normalized viewport coordinates to normalized image coordinates.
    pub fn viewport_to_image(&self, orientation: Orientation, viewport: UVec2) -> Affine2 {
        let res = self.image_resolution.max(UVec2::ONE).as_vec2();
        let k = self.intrinsics;
        let s = self.fill_extents(orientation, viewport);

        // viewport uv -> ndc
        let uv_to_ndc = Affine2::from_scale_angle_translation(
            Vec2::new(2.0, -2.0),
            0.0,
            Vec2::new(-1.0, 1.0),
        );
        // ndc -> eye tangent plane
        let ndc_to_eye = Affine2::from_scale(s);
        // eye -> sensor tangent plane
        let eye_to_sensor = Affine2::from_angle(orientation.angle());
        // sensor tangent plane -> image uv
        let sensor_to_uv = Affine2::from_scale_angle_translation(
            Vec2::new(k.fx / res.x, -k.fy / res.y),
            0.0,
            Vec2::new(k.cx / res.x, k.cy / res.y),
        );

        sensor_to_uv * eye_to_sensor * ndc_to_eye * uv_to_ndc
    }

    /// Where a camera-space point lands in normalized image coordinates.
    pub fn project_to_image(&self, camera_point: glam::Vec3) -> Vec2 {
        let res = self.image_resolution.max(UVec2::ONE).as_vec2();
        let k = self.intrinsics;
        let t = Vec2::new(camera_point.x, camera_point.y) / -camera_point.z;
        Vec2::new(
            (k.fx * t.x + k.cx) / res.x,
            (-k.fy * t.y + k.cy) / res.y,
        )
    }
}
