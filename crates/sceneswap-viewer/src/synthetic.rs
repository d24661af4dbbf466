//! A stand-in tracking session: a slowly panning camera looking at a
//! person-shaped subject close to the lens, with a depth map to match.

use bytes::Bytes;
use glam::{Mat4, UVec2, Vec3};
use parking_lot::Mutex;
use rayon::prelude::*;
use sceneswap::{
    tracking::{CapturedImage, DepthMap, ImagePlane, LightEstimate},
    Anchor, CameraState, Intrinsics, LatestFrame, TrackedFrame, TrackingSource,
};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

pub const IMAGE_SIZE: UVec2 = UVec2::new(256, 192);
pub const DEPTH_SIZE: UVec2 = UVec2::new(128, 96);
pub const HORIZONTAL_FOV_DEG: f32 = 60.0;
pub const CAMERA_HEIGHT: f32 = 1.4;

/// Metres from the camera to the subject and to the room behind it.
pub const SUBJECT_DEPTH: f32 = 0.3;
pub const BACKGROUND_DEPTH: f32 = 3.0;

/// Head and shoulders, in normalized image coordinates.
pub fn is_subject(u: f32, v: f32) -> bool {
    let head = ((u - 0.5) / 0.11).powi(2) + ((v - 0.38) / 0.16).powi(2) <= 1.0;
    let torso = v >= 0.55 && ((u - 0.5) / 0.28).powi(2) + ((v - 1.05) / 0.5).powi(2) <= 1.0;
    head || torso
}

/// Camera pose at time `t`: fixed height, gentle yaw sway.
pub fn camera_transform(t: f64) -> Mat4 {
    let yaw = 0.15 * (t * 0.4).sin() as f32;
    Mat4::from_translation(Vec3::new(0.0, CAMERA_HEIGHT, 0.0)) * Mat4::from_rotation_y(yaw)
}

/// One frame of the synthetic session.
pub fn synthetic_frame(t: f64, anchors: &[Anchor]) -> TrackedFrame {
    let (w, h) = (IMAGE_SIZE.x as usize, IMAGE_SIZE.y as usize);
    let phase = (t * 40.0) as usize;

    let mut luma = vec![0u8; w * h];
    luma.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
        let v = (y as f32 + 0.5) / h as f32;
        for (x, px) in row.iter_mut().enumerate() {
            let u = (x as f32 + 0.5) / w as f32;
            *px = if is_subject(u, v) {
                170
            } else if ((x + phase) / 16 + y / 16) % 2 == 0 {
                90
            } else {
                60
            };
        }
    });

    // Interleaved CbCr at half resolution.
    let (cw, ch) = (w / 2, h / 2);
    let mut chroma = vec![0u8; cw * ch * 2];
    chroma.par_chunks_mut(cw * 2).enumerate().for_each(|(y, row)| {
        let v = (y as f32 + 0.5) / ch as f32;
        for (x, px) in row.chunks_exact_mut(2).enumerate() {
            let u = (x as f32 + 0.5) / cw as f32;
            let (cb, cr) = if is_subject(u, v) { (110, 150) } else { (140, 120) };
            px[0] = cb;
            px[1] = cr;
        }
    });

    let (dw, dh) = (DEPTH_SIZE.x as usize, DEPTH_SIZE.y as usize);
    let mut depth = vec![0f32; dw * dh];
    depth.par_chunks_mut(dw).enumerate().for_each(|(y, row)| {
        let v = (y as f32 + 0.5) / dh as f32;
        for (x, d) in row.iter_mut().enumerate() {
            let u = (x as f32 + 0.5) / dw as f32;
            *d = if is_subject(u, v) {
                SUBJECT_DEPTH
            } else {
                BACKGROUND_DEPTH + 0.2 * u
            };
        }
    });

    TrackedFrame {
        timestamp: t,
        camera: CameraState {
            transform: camera_transform(t),
            intrinsics: Intrinsics::from_fov(HORIZONTAL_FOV_DEG.to_radians(), IMAGE_SIZE),
            image_resolution: IMAGE_SIZE,
        },
        light_estimate: Some(LightEstimate {
            ambient_intensity: 1000.0 + 200.0 * (t * 0.25).sin() as f32,
            ambient_color_temperature: 6500.0,
        }),
        depth: Some(DepthMap {
            width: DEPTH_SIZE.x,
            height: DEPTH_SIZE.y,
            data: depth.into(),
        }),
        anchors: anchors.to_vec(),
        captured_image: CapturedImage {
            planes: vec![
                ImagePlane {
                    width: IMAGE_SIZE.x,
                    height: IMAGE_SIZE.y,
                    bytes_per_row: IMAGE_SIZE.x,
                    data: Bytes::from(luma),
                },
                ImagePlane {
                    width: cw as u32,
                    height: ch as u32,
                    bytes_per_row: (cw * 2) as u32,
                    data: Bytes::from(chroma),
                },
            ],
        },
    }
}

/// Publishes synthetic frames from a background thread.
pub struct SyntheticSession {
    frames: Arc<LatestFrame>,
    anchors: Arc<Mutex<Vec<Anchor>>>,
    next_anchor_id: AtomicU64,
    running: Arc<AtomicBool>,
    started: Instant,
    handle: Option<JoinHandle<()>>,
}

impl SyntheticSession {
    pub fn start(rate_hz: f64) -> Self {
        let frames = Arc::new(LatestFrame::new());
        let anchors = Arc::new(Mutex::new(Vec::new()));
        let running = Arc::new(AtomicBool::new(true));
        let started = Instant::now();
        let period = Duration::from_secs_f64(1.0 / rate_hz.clamp(1.0, 240.0));

        let handle = {
            let frames = frames.clone();
            let anchors = anchors.clone();
            let running = running.clone();
            thread::Builder::new()
                .name("synthetic-tracking".into())
                .spawn(move || {
                    while running.load(Ordering::Relaxed) {
                        let t = started.elapsed().as_secs_f64();
                        let current: Vec<Anchor> = anchors.lock().clone();
                        frames.publish(synthetic_frame(t, &current));
                        thread::sleep(period);
                    }
                })
        };
        let handle = match handle {
            Ok(h) => Some(h),
            Err(e) => {
                log::error!("Failed to start tracking thread: {e}");
                None
            }
        };
        log::info!("Synthetic tracking session started at {:.0} Hz", 1.0 / period.as_secs_f64());

        Self {
            frames,
            anchors,
            next_anchor_id: AtomicU64::new(1),
            running,
            started,
            handle,
        }
    }

    /// The mailbox the compositor reads from.
    pub fn frames(&self) -> Arc<LatestFrame> {
        self.frames.clone()
    }

    /// Places an anchor `distance` metres in front of the current camera.
    pub fn add_anchor(&self, distance: f32) -> Anchor {
        let camera = self
            .frames
            .current_frame()
            .map(|f| f.camera.transform)
            .unwrap_or_else(|| camera_transform(self.started.elapsed().as_secs_f64()));
        let anchor = Anchor {
            id: self.next_anchor_id.fetch_add(1, Ordering::Relaxed),
            transform: camera * Mat4::from_translation(Vec3::new(0.0, 0.0, -distance)),
        };
        self.anchors.lock().push(anchor);
        log::info!("Anchor {} added {:.2} m in front of the camera", anchor.id, distance);
        anchor
    }

    pub fn clear_anchors(&self) {
        self.anchors.lock().clear();
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.lock().len()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Tracking thread panicked");
            }
        }
    }
}

impl Drop for SyntheticSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sceneswap::{cutoff::frame_cutoff, renderer::textures::validate_captured_image, Orientation};

    #[test]
    fn test_frame_is_renderable() {
        let frame = synthetic_frame(0.5, &[]);
        assert_eq!(validate_captured_image(&frame, 4096), Ok(()));
        assert_eq!(frame.captured_image.planes[1].width, IMAGE_SIZE.x / 2);
    }

    #[test]
    fn test_depth_separates_subject() {
        let frame = synthetic_frame(0.0, &[]);
        let depth = frame.depth.unwrap();
        let at = |u: f32, v: f32| {
            let x = (u * depth.width as f32) as usize;
            let y = (v * depth.height as f32) as usize;
            depth.data[y * depth.width as usize + x]
        };
        assert_eq!(at(0.5, 0.4), SUBJECT_DEPTH);
        assert!(at(0.05, 0.05) >= BACKGROUND_DEPTH);
    }

    #[test]
    fn test_tap_anchor_cuts_between_subject_and_room() {
        let t = 1.0;
        let camera = camera_transform(t);
        let anchor = Anchor {
            id: 1,
            transform: camera * Mat4::from_translation(Vec3::new(0.0, 0.0, -0.2)),
        };
        let frame = synthetic_frame(t, &[anchor]);
        let view = frame.camera.view_matrix(Orientation::Portrait);
        let cutoff = frame_cutoff(&view, &frame.anchors);
        assert!(cutoff > SUBJECT_DEPTH && cutoff < BACKGROUND_DEPTH, "cutoff {cutoff}");
    }

    #[test]
    fn test_session_publishes_and_places_anchors() {
        let mut session = SyntheticSession::start(200.0);
        let frames = session.frames();
        let deadline = Instant::now() + Duration::from_secs(5);
        while frames.published_count() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(frames.published_count() > 0);

        let anchor = session.add_anchor(0.2);
        assert_eq!(anchor.id, 1);
        assert_eq!(session.anchor_count(), 1);

        let before = frames.published_count();
        while frames.published_count() < before + 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        let latest = frames.current_frame().unwrap();
        assert_eq!(latest.anchors.len(), 1);

        session.clear_anchors();
        assert_eq!(session.anchor_count(), 0);
        session.stop();
        let count = frames.published_count();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(frames.published_count(), count);
    }
}
