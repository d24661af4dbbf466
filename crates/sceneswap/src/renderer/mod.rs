//! The per-frame compositor. Owns the GPU context, the render targets, the
//! uniform ring and every pass, and turns the latest tracked frame into one
//! presented image.

pub mod capture;
pub mod context;
pub mod destination;
pub mod frame_state;
pub mod mesh;
pub mod pipelines;
pub mod ring;
pub mod targets;
pub mod textures;

pub use self::{
    capture::FrameCapture,
    destination::{Drawable, OffscreenDestination, RenderDestination, SurfaceDestination},
    frame_state::{FrameStats, LightingMode},
    textures::SkipReason,
};

use self::{
    context::GfxContext,
    frame_state::build_frame_uniforms,
    mesh::MeshCache,
    pipelines::{anchor::AnchorPipeline, blit::BlitPass, captured_image::CapturedImagePipeline},
    ring::{FrameRing, SlotPermit},
    targets::{Targets, COLOR_FORMAT, DEPTH_FORMAT},
    textures::{CapturedTextures, ImagePlaneGeometry, TexturePipeline, ViewportState},
};
use crate::{
    assets::{AssetStore, BackdropSource},
    camera::Orientation,
    controls::RenderControls,
    error::{AssetError, RenderError, Result},
    filters::{FilterBank, FilterContext},
    tracking::TrackingSource,
};
use glam::UVec2;
use std::{sync::Arc, time::Instant};

/// Static choices made when the compositor is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RendererConfig {
    pub orientation: Orientation,
    pub lighting: LightingMode,
}

/// What one call to [`Compositor::update`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Rendered {
        /// Ring slot the frame's uniforms were written into.
        slot: usize,
        /// Anchors drawn (at most 64).
        anchors: usize,
    },
    Skipped(SkipReason),
}

impl FrameOutcome {
    pub fn is_rendered(&self) -> bool {
        matches!(self, FrameOutcome::Rendered { .. })
    }
}

/// Host drawing layered over the filtered frame before it is presented,
/// e.g. a UI. Captures never include it.
pub trait FrameOverlay {
    /// Records into the frame's encoder. Any command buffers returned are
    /// submitted ahead of it, in order.
    fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size: (u32, u32),
    ) -> Vec<wgpu::CommandBuffer>;
}

/// Everything a submitted frame needs kept alive until the GPU is done
/// with it. Dropped from the queue's completion callback.
struct FrameArena {
    _permit: SlotPermit,
    _textures: Arc<CapturedTextures>,
}

pub struct Compositor<D: RenderDestination> {
    gfx: GfxContext,
    destination: D,
    tracking: Arc<dyn TrackingSource>,
    assets: Arc<dyn AssetStore>,
    controls: Arc<RenderControls>,
    config: RendererConfig,

    targets: Targets,
    ring: FrameRing,
    textures: TexturePipeline,
    image_plane: ImagePlaneGeometry,
    viewport: ViewportState,
    meshes: MeshCache,

    anchor: AnchorPipeline,
    captured: CapturedImagePipeline,
    filters: FilterBank,
    blit: BlitPass,

    stats: FrameStats,
    last_presented: Option<f64>,
    object: String,
    backdrop: String,
}

impl<D: RenderDestination> Compositor<D> {
    /// Builds every pipeline and loads the initial mesh and backdrop.
    /// Missing assets fail construction.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gfx: GfxContext,
        destination: D,
        tracking: Arc<dyn TrackingSource>,
        assets: Arc<dyn AssetStore>,
        controls: Arc<RenderControls>,
        config: RendererConfig,
        object: &str,
        backdrop: BackdropSource,
    ) -> Result<Self> {
        let device = &gfx.device;
        let (width, height) = destination.size();

        let targets = Targets::new(device, width, height);
        let ring = FrameRing::new(device, gfx.uniform_offset_alignment());
        let textures = TexturePipeline::new(device);
        let image_plane = ImagePlaneGeometry::new(device);

        let anchor = AnchorPipeline::new(
            device,
            &ring.layout,
            &textures.backdrop_layout,
            COLOR_FORMAT,
            DEPTH_FORMAT,
        );
        let captured = CapturedImagePipeline::new(
            device,
            &ring.layout,
            &textures.captured_layout,
            COLOR_FORMAT,
            DEPTH_FORMAT,
        );
        let filters = FilterBank::new(device, COLOR_FORMAT);
        let blit = BlitPass::new(device, destination.format());

        let mut compositor = Self {
            viewport: ViewportState::new(width, height),
            gfx,
            destination,
            tracking,
            assets,
            controls,
            config,
            targets,
            ring,
            textures,
            image_plane,
            meshes: MeshCache::new(),
            anchor,
            captured,
            filters,
            blit,
            stats: FrameStats::default(),
            last_presented: None,
            object: String::new(),
            backdrop: String::new(),
        };
        compositor.set_object(object)?;
        compositor.set_image(backdrop)?;

        log::info!(
            "Compositor ready: {}x{}, {} orientation, {:?} lighting",
            width,
            height,
            config.orientation,
            config.lighting
        );
        Ok(compositor)
    }

    /// Renders one frame from the latest tracked frame.
    pub fn update(&mut self) -> FrameOutcome {
        self.render(None)
    }

    /// Like [`Compositor::update`], letting `overlay` draw on the drawable
    /// before it is presented.
    pub fn update_with_overlay(&mut self, overlay: &mut dyn FrameOverlay) -> FrameOutcome {
        self.render(Some(overlay))
    }

    fn render(&mut self, overlay: Option<&mut dyn FrameOverlay>) -> FrameOutcome {
        // Blocks while three frames are in flight.
        let permit = self.ring.acquire(&self.gfx.device);

        let Some(frame) = self.tracking.current_frame() else {
            self.stats.skipped_no_frame += 1;
            return self.skip(SkipReason::NoTrackingFrame);
        };

        let uniforms = build_frame_uniforms(
            &frame,
            self.config.orientation,
            self.viewport.size(),
            self.controls.mix_factor(),
            self.config.lighting,
        );

        let captured = match self
            .textures
            .update_captured_textures(&self.gfx.device, &self.gfx.queue, &frame)
        {
            Ok(captured) => captured,
            Err(reason) => {
                self.stats.skipped_textures += 1;
                return self.skip(reason);
            }
        };

        if self.viewport.take_dirty() {
            self.image_plane.update(
                &self.gfx.queue,
                &frame.camera,
                self.config.orientation,
                self.viewport.size(),
            );
        }

        let Some(drawable) = self.destination.acquire(&self.gfx.device) else {
            self.stats.skipped_no_drawable += 1;
            return self.skip(SkipReason::NoDrawable);
        };

        // Only frames that will be submitted take a slot.
        let slot = self.ring.advance();
        self.ring
            .write(&self.gfx.queue, slot, &uniforms.shared, &uniforms.instances);
        let offsets = slot.dynamic_offsets();
        let instance_count = uniforms.instances.len() as u32;

        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Pass 1: anchors, then the camera plane composited over them.
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.targets.scene,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let (Some(mesh), Some(backdrop)) = (self.meshes.current(), self.textures.backdrop()) {
                self.anchor.draw(
                    &mut pass,
                    &self.ring.bind_group,
                    &offsets,
                    &backdrop.bind_group,
                    mesh,
                    0..instance_count,
                );
            }
            self.captured.draw(
                &mut pass,
                &self.ring.bind_group,
                &offsets,
                &captured.bind_group,
                &self.image_plane.vertex_buffer,
            );
        }

        // Pass 2: the active filter, scene -> output.
        let filter = self.controls.active_filter();
        let ctx = FilterContext {
            device: &self.gfx.device,
            width: self.targets.width,
            height: self.targets.height,
            scratch: &self.targets.scratch,
        };
        self.filters
            .encode(filter, &ctx, &mut encoder, &self.targets.scene, &self.targets.output);

        // Pass 3: output -> drawable, then the host overlay.
        self.blit
            .draw(&self.gfx.device, &mut encoder, &drawable.view, &self.targets.output);
        let overlay_buffers = match overlay {
            Some(overlay) => overlay.draw(
                &self.gfx.device,
                &self.gfx.queue,
                &mut encoder,
                &drawable.view,
                self.destination.size(),
            ),
            None => Vec::new(),
        };

        self.gfx
            .queue
            .submit(overlay_buffers.into_iter().chain(std::iter::once(encoder.finish())));

        let arena = FrameArena {
            _permit: permit,
            _textures: captured,
        };
        self.gfx.queue.on_submitted_work_done(move || drop(arena));

        drawable.present();
        self.stats.record_rendered(Instant::now());
        self.last_presented = Some(frame.timestamp);

        log::trace!(
            "Frame {:.3} rendered: slot {}, {} anchors, filter {}",
            frame.timestamp,
            slot.index,
            instance_count,
            filter
        );
        FrameOutcome::Rendered {
            slot: slot.index,
            anchors: instance_count as usize,
        }
    }

    fn skip(&self, reason: SkipReason) -> FrameOutcome {
        log::debug!("Frame skipped: {reason}");
        FrameOutcome::Skipped(reason)
    }

    /// Replaces the anchor mesh. On error the current mesh stays.
    pub fn set_object(&mut self, name: &str) -> Result<()> {
        let mesh = self.assets.load_mesh(name)?;
        self.meshes.load(&self.gfx.device, &mesh);
        self.object = name.to_string();
        Ok(())
    }

    /// Replaces the backdrop texture. On error the current backdrop stays.
    pub fn set_image(&mut self, source: BackdropSource) -> Result<()> {
        let label = source.describe();
        let image = match source {
            BackdropSource::Named(name) => self.assets.load_image(&name)?,
            BackdropSource::Raw(image) => image,
        };
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(AssetError::EmptyImage(label).into());
        }
        let max = self.gfx.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(AssetError::ImageTooLarge {
                name: label,
                width,
                height,
                max,
            }
            .into());
        }
        self.textures
            .load_backdrop(&self.gfx.device, &self.gfx.queue, &image);
        self.backdrop = label;
        Ok(())
    }

    /// Resizes the destination and the render targets. The image plane is
    /// recomputed on the next frame if the size actually changed.
    pub fn on_viewport_resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.destination.resize(&self.gfx.device, width, height);
        if self.viewport.resize(width, height) {
            self.targets.resize(&self.gfx.device, width, height);
            // The output target was recreated; it holds nothing to capture.
            self.last_presented = None;
            log::debug!("Viewport resized to {}x{}", width, height);
        }
    }

    /// Changes the interface orientation; the image plane follows on the
    /// next frame.
    pub fn set_orientation(&mut self, orientation: Orientation) {
        if orientation != self.config.orientation {
            self.config.orientation = orientation;
            let size = self.viewport.size();
            self.viewport = ViewportState::new(size.x, size.y);
        }
    }

    /// Reads back the last presented frame as it left the filter stage.
    pub fn capture_frame(&self) -> Result<FrameCapture> {
        let timestamp = self.last_presented.ok_or(RenderError::NothingPresented)?;
        let image = capture::read_rgba_texture(
            &self.gfx.device,
            &self.gfx.queue,
            self.targets.output_texture(),
        )?;
        Ok(FrameCapture { timestamp, image })
    }

    /// Waits until every submitted frame has completed.
    pub fn wait_idle(&self) {
        self.gfx.device.poll(wgpu::Maintain::Wait);
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    pub fn controls(&self) -> &Arc<RenderControls> {
        &self.controls
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    pub fn gfx(&self) -> &GfxContext {
        &self.gfx
    }

    pub fn destination(&self) -> &D {
        &self.destination
    }

    pub fn viewport_size(&self) -> UVec2 {
        self.viewport.size()
    }

    /// Frames submitted but not yet completed by the GPU.
    pub fn frames_in_flight(&self) -> usize {
        let gate = self.ring.gate();
        gate.capacity() - gate.available()
    }

    /// Frames that have taken a ring slot so far.
    pub fn frames_submitted(&self) -> u64 {
        self.ring.frames_advanced()
    }

    pub fn image_plane_recomputes(&self) -> u64 {
        self.image_plane.recompute_count()
    }

    pub fn object_name(&self) -> &str {
        &self.object
    }

    pub fn backdrop_name(&self) -> &str {
        &self.backdrop
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assets::{parse_obj, InMemoryAssetStore},
        filters::FilterKind,
        tracking::{test_support, LatestFrame},
    };
    use bytes::Bytes;
    use image::{Rgba, RgbaImage};

    const QUAD_OBJ: &str = "\
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";

    /// The shipped backdrop cylinder; seen from an anchor near its axis it
    /// fills the whole view.
    const CYLINDER_OBJ: &str = include_str!("../../../../assets/Cylinderv01.obj");

    struct Harness {
        compositor: Compositor<OffscreenDestination>,
        frames: Arc<LatestFrame>,
        controls: Arc<RenderControls>,
    }

    fn harness() -> Option<Harness> {
        let gfx = pollster::block_on(GfxContext::headless()).ok()?;
        let destination = OffscreenDestination::new(&gfx.device, COLOR_FORMAT, 96, 128);

        let assets = Arc::new(InMemoryAssetStore::new());
        assets.insert_mesh("Quad", parse_obj("Quad", QUAD_OBJ).unwrap());
        assets.insert_mesh("Cylinder", parse_obj("Cylinder", CYLINDER_OBJ).unwrap());
        assets.insert_image("Red", RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255])));

        let frames = Arc::new(LatestFrame::new());
        let controls = Arc::new(RenderControls::default());
        let compositor = Compositor::new(
            gfx,
            destination,
            frames.clone(),
            assets,
            controls.clone(),
            RendererConfig::default(),
            "Quad",
            BackdropSource::named("Red"),
        )
        .unwrap();
        Some(Harness {
            compositor,
            frames,
            controls,
        })
    }

    /// Flat grey capture with no anchors.
    fn grey_frame(depth: f32) -> crate::tracking::TrackedFrame {
        let mut frame = test_support::frame();
        let luma = &mut frame.captured_image.planes[0];
        luma.data = Bytes::from(vec![200u8; (luma.bytes_per_row * luma.height) as usize]);
        if let Some(d) = frame.depth.as_mut() {
            d.data = vec![depth; (d.width * d.height) as usize].into();
        }
        frame.anchors.clear();
        frame
    }

    /// Flat grey capture keeping the default depth (0.5m disc, 3m around)
    /// and its anchor 0.5m ahead, which puts the cutoff at 0.65m.
    fn anchored_grey_frame() -> crate::tracking::TrackedFrame {
        let mut frame = test_support::frame();
        let luma = &mut frame.captured_image.planes[0];
        luma.data = Bytes::from(vec![200u8; (luma.bytes_per_row * luma.height) as usize]);
        frame
    }

    fn is_grey(px: &Rgba<u8>) -> bool {
        (0..3).all(|c| (px[c] as i32 - 200).abs() <= 2)
    }

    macro_rules! gpu_harness {
        () => {
            match harness() {
                Some(h) => h,
                None => {
                    eprintln!("no GPU adapter, skipping");
                    return;
                }
            }
        };
    }

    #[test]
    fn test_skips_without_tracking_frame() {
        let mut h = gpu_harness!();
        assert_eq!(
            h.compositor.update(),
            FrameOutcome::Skipped(SkipReason::NoTrackingFrame)
        );
        assert_eq!(h.compositor.stats().skipped_no_frame, 1);
        assert_eq!(h.compositor.frames_submitted(), 0);
        // The permit went straight back.
        assert_eq!(h.compositor.frames_in_flight(), 0);
        assert!(matches!(
            h.compositor.capture_frame(),
            Err(RenderError::NothingPresented)
        ));
    }

    #[test]
    fn test_rendered_frames_rotate_slots() {
        let mut h = gpu_harness!();
        h.frames.publish(test_support::frame());

        let slots: Vec<_> = (0..5)
            .map(|_| match h.compositor.update() {
                FrameOutcome::Rendered { slot, anchors } => {
                    assert_eq!(anchors, 1);
                    slot
                }
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 0, 1]);
        assert!(h.compositor.frames_in_flight() <= 3);

        h.compositor.wait_idle();
        assert_eq!(h.compositor.frames_in_flight(), 0);
        assert_eq!(h.compositor.stats().rendered, 5);
        assert_eq!(h.compositor.destination().acquired_count(), 5);
    }

    #[test]
    fn test_invalid_frame_is_skipped_without_a_slot() {
        let mut h = gpu_harness!();
        let mut frame = test_support::frame();
        frame.captured_image.planes.truncate(1);
        h.frames.publish(frame);

        assert_eq!(
            h.compositor.update(),
            FrameOutcome::Skipped(SkipReason::MissingPlanes { found: 1 })
        );
        assert_eq!(h.compositor.stats().skipped_textures, 1);
        assert_eq!(h.compositor.frames_submitted(), 0);
        assert_eq!(h.compositor.frames_in_flight(), 0);
    }

    #[test]
    fn test_mix_zero_shows_capture() {
        let mut h = gpu_harness!();
        h.controls.set_mix_factor(0.0);
        h.frames.publish(grey_frame(f32::NAN));
        assert!(h.compositor.update().is_rendered());

        let capture = h.compositor.capture_frame().unwrap();
        assert_eq!(capture.timestamp, 1.0);
        assert_eq!(capture.image.dimensions(), (96, 128));
        let px = capture.image.get_pixel(48, 64);
        for c in 0..3 {
            assert!((px[c] as i32 - 200).abs() <= 2, "pixel {px:?}");
        }
    }

    #[test]
    fn test_mix_one_replaces_background() {
        let mut h = gpu_harness!();
        h.controls.set_mix_factor(1.0);

        // Invalid depth is background: with no anchors only the clear colour remains.
        h.frames.publish(grey_frame(f32::NAN));
        assert!(h.compositor.update().is_rendered());
        let px = *h.compositor.capture_frame().unwrap().image.get_pixel(48, 64);
        assert!(px[0] <= 2 && px[1] <= 2 && px[2] <= 2, "pixel {px:?}");

        // Valid depth with no anchor means no cutoff: the subject stays.
        h.frames.publish(grey_frame(2.0));
        assert!(h.compositor.update().is_rendered());
        let px = *h.compositor.capture_frame().unwrap().image.get_pixel(48, 64);
        assert!((px[0] as i32 - 200).abs() <= 2, "pixel {px:?}");
    }

    #[test]
    fn test_depth_beyond_anchor_cutoff_is_replaced() {
        let mut h = gpu_harness!();
        h.compositor.set_object("Cylinder").unwrap();
        h.controls.set_mix_factor(1.0);
        h.frames.publish(anchored_grey_frame());

        assert_eq!(
            h.compositor.update(),
            FrameOutcome::Rendered { slot: 0, anchors: 1 }
        );
        let image = h.compositor.capture_frame().unwrap().image;
        // Centre: depth 0.5m is in front of the cutoff and keeps the capture.
        let centre = image.get_pixel(48, 64);
        assert!(is_grey(centre), "centre {centre:?}");
        // Corner: depth 3m is behind it and shows the red backdrop.
        let corner = image.get_pixel(2, 2);
        assert!(corner[0] > 200 && corner[1] < 30 && corner[2] < 30, "corner {corner:?}");

        h.controls.set_mix_factor(0.0);
        assert!(h.compositor.update().is_rendered());
        let image = h.compositor.capture_frame().unwrap().image;
        assert!(is_grey(image.get_pixel(48, 64)));
        let corner = image.get_pixel(2, 2);
        assert!(is_grey(corner), "corner {corner:?}");
    }

    /// Paints the drawable solid green and clears its own marker texture
    /// from a separate command buffer.
    struct GreenOverlay {
        marker: wgpu::Texture,
        size: Option<(u32, u32)>,
    }

    fn clear_pass(encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, color: wgpu::Color) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Test Overlay Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }

    impl FrameOverlay for GreenOverlay {
        fn draw(
            &mut self,
            device: &wgpu::Device,
            _queue: &wgpu::Queue,
            encoder: &mut wgpu::CommandEncoder,
            target: &wgpu::TextureView,
            size: (u32, u32),
        ) -> Vec<wgpu::CommandBuffer> {
            self.size = Some(size);
            clear_pass(encoder, target, wgpu::Color::GREEN);

            let mut extra = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Test Overlay Extra"),
            });
            let view = self.marker.create_view(&wgpu::TextureViewDescriptor::default());
            clear_pass(&mut extra, &view, wgpu::Color::BLUE);
            vec![extra.finish()]
        }
    }

    #[test]
    fn test_overlay_reaches_drawable_but_not_capture() {
        let mut h = gpu_harness!();
        h.controls.set_mix_factor(0.0);
        h.frames.publish(grey_frame(1.0));

        let device = &h.compositor.gfx().device;
        let marker = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Overlay Marker"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let mut overlay = GreenOverlay { marker, size: None };

        assert!(h.compositor.update_with_overlay(&mut overlay).is_rendered());
        assert_eq!(overlay.size, Some((96, 128)));

        let gfx = h.compositor.gfx();
        let marker = capture::read_rgba_texture(&gfx.device, &gfx.queue, &overlay.marker).unwrap();
        assert!(marker.pixels().all(|p| p.0 == [0, 0, 255, 255]));

        let drawable =
            capture::read_rgba_texture(&gfx.device, &gfx.queue, h.compositor.destination().texture())
                .unwrap();
        assert_eq!(drawable.get_pixel(48, 64).0, [0, 255, 0, 255]);

        let captured = h.compositor.capture_frame().unwrap().image;
        assert!(is_grey(captured.get_pixel(48, 64)));
    }

    #[test]
    fn test_every_filter_renders() {
        let mut h = gpu_harness!();
        h.frames.publish(test_support::frame());
        for kind in FilterKind::ALL {
            h.controls.set_active_filter(kind);
            assert!(h.compositor.update().is_rendered(), "{kind}");
        }
        h.compositor.wait_idle();
        assert_eq!(h.compositor.stats().rendered, FilterKind::ALL.len() as u64);
    }

    #[test]
    fn test_threshold_filter_is_binary() {
        let mut h = gpu_harness!();
        h.controls.set_mix_factor(0.0);
        h.controls.set_active_filter(FilterKind::ThresholdBinary);
        h.frames.publish(grey_frame(1.0));
        assert!(h.compositor.update().is_rendered());
        let image = h.compositor.capture_frame().unwrap().image;
        // 200/255 is above the threshold everywhere.
        assert!(image.pixels().all(|p| p[0] == 255 && p[1] == 255 && p[2] == 255));
    }

    #[test]
    fn test_resize_recomputes_image_plane_once() {
        let mut h = gpu_harness!();
        h.frames.publish(test_support::frame());

        h.compositor.update();
        assert_eq!(h.compositor.image_plane_recomputes(), 1);
        h.compositor.update();
        assert_eq!(h.compositor.image_plane_recomputes(), 1);

        h.compositor.on_viewport_resize(96, 128);
        h.compositor.update();
        assert_eq!(h.compositor.image_plane_recomputes(), 1);

        h.compositor.on_viewport_resize(128, 96);
        assert!(matches!(
            h.compositor.capture_frame(),
            Err(RenderError::NothingPresented)
        ));
        h.compositor.update();
        h.compositor.update();
        assert_eq!(h.compositor.image_plane_recomputes(), 2);
        assert_eq!(h.compositor.viewport_size(), UVec2::new(128, 96));
        assert_eq!(
            h.compositor.capture_frame().unwrap().image.dimensions(),
            (128, 96)
        );
    }

    #[test]
    fn test_asset_swaps_keep_previous_on_error() {
        let mut h = gpu_harness!();
        assert_eq!(h.compositor.object_name(), "Quad");
        assert_eq!(h.compositor.backdrop_name(), "Red");

        let err = h.compositor.set_object("Missing").unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::NotFound { .. })));
        assert_eq!(h.compositor.object_name(), "Quad");

        let err = h
            .compositor
            .set_image(BackdropSource::Raw(RgbaImage::new(0, 0)))
            .unwrap_err();
        assert!(matches!(err, RenderError::Asset(AssetError::EmptyImage(_))));
        assert_eq!(h.compositor.backdrop_name(), "Red");

        h.compositor
            .set_image(BackdropSource::Raw(RgbaImage::new(8, 2)))
            .unwrap();
        assert_eq!(h.compositor.backdrop_name(), "raw 8x2");
    }

    #[test]
    fn test_oversized_backdrop_is_rejected() {
        let mut h = gpu_harness!();
        let max = h.compositor.gfx().device.limits().max_texture_dimension_2d;

        let err = h
            .compositor
            .set_image(BackdropSource::Raw(RgbaImage::new(max + 1, 1)))
            .unwrap_err();
        assert!(matches!(
            err,
            RenderError::Asset(AssetError::ImageTooLarge { width, max: m, .. }) if width == max + 1 && m == max
        ));
        assert_eq!(h.compositor.backdrop_name(), "Red");

        // The previous backdrop still renders.
        h.frames.publish(test_support::frame());
        assert!(h.compositor.update().is_rendered());
    }

    #[test]
    fn test_oversized_plane_skips_frame() {
        let mut h = gpu_harness!();
        let max = h.compositor.gfx().device.limits().max_texture_dimension_2d;

        let mut frame = test_support::frame();
        frame.captured_image.planes[0].width = max + 1;
        h.frames.publish(frame);

        assert_eq!(
            h.compositor.update(),
            FrameOutcome::Skipped(SkipReason::PlaneTooLarge { plane: 0, max })
        );
        assert_eq!(h.compositor.stats().skipped_textures, 1);
        assert_eq!(h.compositor.frames_submitted(), 0);
        assert_eq!(h.compositor.frames_in_flight(), 0);
    }
}
