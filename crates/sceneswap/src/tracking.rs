//! Tracked frame data model and the seam the compositor reads frames from.

use crate::camera::CameraState;
use bytes::Bytes;
use glam::Mat4;
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Index of the luma plane in [`CapturedImage::planes`].
pub const LUMA_PLANE: usize = 0;
/// Index of the interleaved CbCr plane in [`CapturedImage::planes`].
pub const CHROMA_PLANE: usize = 1;

/// A tracked real-world pose that virtual geometry is attached to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Anchor {
    pub id: u64,
    /// Anchor-to-world transform.
    pub transform: Mat4,
}

/// One plane of a planar camera image.
#[derive(Clone, Debug)]
pub struct ImagePlane {
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
    pub data: Bytes,
}

impl ImagePlane {
    /// Bytes needed to hold the declared geometry, if it is well formed.
    pub fn required_len(&self, bytes_per_texel: u32) -> Option<usize> {
        if self.width == 0 || self.height == 0 {
            return None;
        }
        let row = self.width.checked_mul(bytes_per_texel)?;
        if self.bytes_per_row < row {
            return None;
        }
        let body = (self.height as usize - 1).checked_mul(self.bytes_per_row as usize)?;
        body.checked_add(row as usize)
    }
}

/// Bi-planar YCbCr camera image (plane 0 luma, plane 1 CbCr).
#[derive(Clone, Debug, Default)]
pub struct CapturedImage {
    pub planes: Vec<ImagePlane>,
}

/// Per-pixel distance from the camera in metres, row-major.
#[derive(Clone, Debug)]
pub struct DepthMap {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[f32]>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightEstimate {
    /// Ambient intensity in lumens; 1000 is neutral.
    pub ambient_intensity: f32,
    /// Colour temperature in kelvin; 6500 is neutral.
    pub ambient_color_temperature: f32,
}

/// Everything the tracking session knows about one camera tick.
#[derive(Clone, Debug)]
pub struct TrackedFrame {
    pub timestamp: f64,
    pub camera: CameraState,
    pub light_estimate: Option<LightEstimate>,
    pub depth: Option<DepthMap>,
    /// Anchors in the order they were added.
    pub anchors: Vec<Anchor>,
    pub captured_image: CapturedImage,
}

/// Supplies the most recent tracked frame to the render loop.
pub trait TrackingSource: Send + Sync {
    /// The latest frame, or `None` before the session has produced one.
    fn current_frame(&self) -> Option<Arc<TrackedFrame>>;
}

impl<T: TrackingSource + ?Sized> TrackingSource for Arc<T> {
    fn current_frame(&self) -> Option<Arc<TrackedFrame>> {
        (**self).current_frame()
    }
}

/// Single-slot mailbox between a tracking thread and the render loop.
///
/// Publishing replaces whatever was there; readers always see the newest
/// frame and never wait.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Arc<TrackedFrame>>>,
    published: AtomicU64,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `frame` as the latest and returns the running publish count.
    pub fn publish(&self, frame: TrackedFrame) -> u64 {
        self.publish_arc(Arc::new(frame))
    }

    pub fn publish_arc(&self, frame: Arc<TrackedFrame>) -> u64 {
        *self.slot.lock() = Some(frame);
        self.published.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Drops the stored frame, e.g. when the session pauses.
    pub fn clear(&self) {
        self.slot.lock().take();
    }

    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl TrackingSource for LatestFrame {
    fn current_frame(&self) -> Option<Arc<TrackedFrame>> {
        self.slot.lock().clone()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::camera::Intrinsics;
    use glam::{UVec2, Vec3};

    /// A small, fully populated frame: 64x48 image, depth 0.5m in the centre
    /// and 3m around it, one anchor 0.5m in front of the camera.
    pub fn frame() -> TrackedFrame {
        let (w, h) = (64u32, 48u32);
        let luma: Vec<u8> = (0..w * h).map(|i| (i % 251) as u8).collect();
        let chroma = vec![128u8; (w / 2 * h / 2 * 2) as usize];
        let depth: Vec<f32> = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as i32 - 32, (i / w) as i32 - 24);
                if x * x + y * y < 100 {
                    0.5
                } else {
                    3.0
                }
            })
            .collect();

        let resolution = UVec2::new(w, h);
        let transform = Mat4::from_translation(Vec3::new(0.0, 1.4, 0.0));
        TrackedFrame {
            timestamp: 1.0,
            camera: CameraState {
                transform,
                intrinsics: Intrinsics::from_fov(60f32.to_radians(), resolution),
                image_resolution: resolution,
            },
            light_estimate: Some(LightEstimate {
                ambient_intensity: 1000.0,
                ambient_color_temperature: 6500.0,
            }),
            depth: Some(DepthMap {
                width: w,
                height: h,
                data: depth.into(),
            }),
            anchors: vec![Anchor {
                id: 1,
                transform: transform * Mat4::from_translation(Vec3::new(0.0, 0.0, -0.5)),
            }],
            captured_image: CapturedImage {
                planes: vec![
                    ImagePlane {
                        width: w,
                        height: h,
                        bytes_per_row: w,
                        data: Bytes::from(luma),
                    },
                    ImagePlane {
                        width: w / 2,
                        height: h / 2,
                        bytes_per_row: w,
                        data: Bytes::from(chroma),
                    },
                ],
            },
        }
    }
}
