//! Per-frame camera textures, the cached backdrop texture and the
//! image-plane geometry that maps the camera feed onto the viewport.

use crate::{
    camera::{CameraState, Orientation},
    tracking::{TrackedFrame, CHROMA_PLANE, LUMA_PLANE},
    uniforms::ImagePlaneVertex,
};
use glam::{Affine2, UVec2, Vec2};
use image::RgbaImage;
use std::{fmt, sync::Arc};
use wgpu::util::DeviceExt;

/// Why a frame was not rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// The tracking source has not produced a frame yet.
    NoTrackingFrame,
    /// The captured image has fewer than the two required planes.
    MissingPlanes { found: usize },
    MissingDepth,
    /// A plane's byte length does not cover its declared size.
    MalformedPlane { plane: usize },
    MalformedDepth,
    /// A plane is larger than the device's 2D texture limit.
    PlaneTooLarge { plane: usize, max: u32 },
    /// The destination had no drawable this cycle.
    NoDrawable,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoTrackingFrame => f.write_str("no tracking frame"),
            SkipReason::MissingPlanes { found } => {
                write!(f, "captured image has {found} plane(s), need 2")
            }
            SkipReason::MissingDepth => f.write_str("frame has no depth map"),
            SkipReason::MalformedPlane { plane } => write!(f, "plane {plane} is truncated"),
            SkipReason::MalformedDepth => f.write_str("depth map is truncated"),
            SkipReason::PlaneTooLarge { plane, max } => {
                write!(f, "plane {plane} exceeds the {max}px texture limit")
            }
            SkipReason::NoDrawable => f.write_str("no drawable available"),
        }
    }
}

/// Index reported by [`SkipReason::PlaneTooLarge`] for the depth map.
pub const DEPTH_PLANE: usize = 2;

/// Checks that a frame carries everything needed to build its textures and
/// that no plane exceeds `max_dimension` on either side.
pub fn validate_captured_image(frame: &TrackedFrame, max_dimension: u32) -> Result<(), SkipReason> {
    let planes = &frame.captured_image.planes;
    if planes.len() < 2 {
        return Err(SkipReason::MissingPlanes { found: planes.len() });
    }
    let depth = frame.depth.as_ref().ok_or(SkipReason::MissingDepth)?;

    let sizes = [
        (LUMA_PLANE, planes[LUMA_PLANE].width, planes[LUMA_PLANE].height),
        (CHROMA_PLANE, planes[CHROMA_PLANE].width, planes[CHROMA_PLANE].height),
        (DEPTH_PLANE, depth.width, depth.height),
    ];
    if let Some((plane, ..)) = sizes
        .into_iter()
        .find(|&(_, w, h)| w > max_dimension || h > max_dimension)
    {
        return Err(SkipReason::PlaneTooLarge {
            plane,
            max: max_dimension,
        });
    }

    for (index, bytes_per_texel) in [(LUMA_PLANE, 1), (CHROMA_PLANE, 2)] {
        let plane = &planes[index];
        match plane.required_len(bytes_per_texel) {
            Some(len) if plane.data.len() >= len => {}
            _ => return Err(SkipReason::MalformedPlane { plane: index }),
        }
    }

    let texels = depth.width as usize * depth.height as usize;
    if texels == 0 || depth.data.len() < texels {
        return Err(SkipReason::MalformedDepth);
    }
    Ok(())
}

/// Luma, chroma and depth textures for one frame.
///
/// Shared with the frame's in-flight arena so the textures outlive the GPU
/// work that samples them.
pub struct CapturedTextures {
    pub timestamp: f64,
    pub bind_group: wgpu::BindGroup,
    pub luma: wgpu::Texture,
    pub chroma: wgpu::Texture,
    pub depth: wgpu::Texture,
}

/// The backdrop image on the GPU, sampled by the anchor pipeline.
pub struct BackdropTexture {
    pub width: u32,
    pub height: u32,
    pub bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

pub struct TexturePipeline {
    pub captured_layout: wgpu::BindGroupLayout,
    pub backdrop_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    current: Option<Arc<CapturedTextures>>,
    backdrop: Option<BackdropTexture>,
}

fn texture_entry(binding: u32, sample_type: wgpu::TextureSampleType) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type,
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

fn upload_plane(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    format: wgpu::TextureFormat,
    (width, height): (u32, u32),
    bytes_per_row: u32,
    data: &[u8],
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(bytes_per_row),
            rows_per_image: Some(height),
        },
        size,
    );
    texture
}

impl TexturePipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let filterable = wgpu::TextureSampleType::Float { filterable: true };
        let captured_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Captured Image Layout"),
            entries: &[
                texture_entry(0, filterable),
                texture_entry(1, filterable),
                // Depth is read with textureLoad; R32Float is not filterable everywhere.
                texture_entry(2, wgpu::TextureSampleType::Float { filterable: false }),
                sampler_entry(3),
            ],
        });

        let backdrop_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Backdrop Layout"),
            entries: &[texture_entry(0, filterable), sampler_entry(1)],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Captured Image Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Self {
            captured_layout,
            backdrop_layout,
            sampler,
            current: None,
            backdrop: None,
        }
    }

    /// Builds this frame's camera textures.
    ///
    /// On failure nothing changes: the previously built textures stay as
    /// they were and the caller skips the frame.
    pub fn update_captured_textures(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        frame: &TrackedFrame,
    ) -> Result<Arc<CapturedTextures>, SkipReason> {
        validate_captured_image(frame, device.limits().max_texture_dimension_2d)?;
        let planes = &frame.captured_image.planes;
        let luma_plane = &planes[LUMA_PLANE];
        let chroma_plane = &planes[CHROMA_PLANE];
        let depth_map = frame.depth.as_ref().ok_or(SkipReason::MissingDepth)?;

        let luma = upload_plane(
            device,
            queue,
            "Captured Luma",
            wgpu::TextureFormat::R8Unorm,
            (luma_plane.width, luma_plane.height),
            luma_plane.bytes_per_row,
            &luma_plane.data,
        );
        let chroma = upload_plane(
            device,
            queue,
            "Captured Chroma",
            wgpu::TextureFormat::Rg8Unorm,
            (chroma_plane.width, chroma_plane.height),
            chroma_plane.bytes_per_row,
            &chroma_plane.data,
        );
        let texels = (depth_map.width * depth_map.height) as usize;
        let depth = upload_plane(
            device,
            queue,
            "Captured Depth",
            wgpu::TextureFormat::R32Float,
            (depth_map.width, depth_map.height),
            depth_map.width * 4,
            bytemuck::cast_slice(&depth_map.data[..texels]),
        );

        let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Captured Image Bind"),
            layout: &self.captured_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view(&luma)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view(&chroma)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&view(&depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        let textures = Arc::new(CapturedTextures {
            timestamp: frame.timestamp,
            bind_group,
            luma,
            chroma,
            depth,
        });
        self.current = Some(textures.clone());
        Ok(textures)
    }

    /// Textures built by the last successful update.
    pub fn current(&self) -> Option<&Arc<CapturedTextures>> {
        self.current.as_ref()
    }

    /// Uploads a new backdrop, replacing the cached one.
    pub fn load_backdrop(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage) {
        let (width, height) = image.dimensions();
        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Backdrop Texture"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                // Kept gamma-encoded like the camera feed; the whole pipeline is non-sRGB.
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            image.as_raw(),
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Backdrop Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Backdrop Bind"),
            layout: &self.backdrop_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        });

        log::info!("Backdrop texture loaded ({}x{})", width, height);
        self.backdrop = Some(BackdropTexture {
            width,
            height,
            bind_group,
            _texture: texture,
        });
    }

    pub fn backdrop(&self) -> Option<&BackdropTexture> {
        self.backdrop.as_ref()
    }
}

/// Tracks the output size and whether the image plane needs new UVs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewportState {
    size: UVec2,
    dirty: bool,
}

impl ViewportState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: UVec2::new(width.max(1), height.max(1)),
            dirty: true,
        }
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    /// Records a resize and returns whether the size changed. Only a change
    /// marks the plane dirty.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let size = UVec2::new(width.max(1), height.max(1));
        let changed = size != self.size;
        if changed {
            self.size = size;
            self.dirty = true;
        }
        changed
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns whether a recompute is due and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

/// Clip-space corners of the image plane, drawn as a triangle strip, with
/// their viewport texture coordinates.
pub const IMAGE_PLANE_CORNERS: [([f32; 2], [f32; 2]); 4] = [
    ([-1.0, -1.0], [0.0, 1.0]),
    ([1.0, -1.0], [1.0, 1.0]),
    ([-1.0, 1.0], [0.0, 0.0]),
    ([1.0, 1.0], [1.0, 0.0]),
];

/// Image-plane vertices for a viewport-to-image transform.
pub fn image_plane_vertices(viewport_to_image: &Affine2) -> [ImagePlaneVertex; 4] {
    IMAGE_PLANE_CORNERS.map(|(position, uv)| ImagePlaneVertex {
        position,
        tex_coord: viewport_to_image
            .transform_point2(Vec2::from(uv))
            .to_array(),
    })
}

/// Vertex buffer of the full-screen camera plane.
pub struct ImagePlaneGeometry {
    pub vertex_buffer: wgpu::Buffer,
    vertices: [ImagePlaneVertex; 4],
    recomputes: u64,
}

impl ImagePlaneGeometry {
    pub fn new(device: &wgpu::Device) -> Self {
        let vertices = image_plane_vertices(&Affine2::IDENTITY);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Image Plane VB"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        Self {
            vertex_buffer,
            vertices,
            recomputes: 0,
        }
    }

    /// Recomputes the texture coordinates so the camera feed aspect-fills the
    /// viewport, and uploads them.
    pub fn update(
        &mut self,
        queue: &wgpu::Queue,
        camera: &CameraState,
        orientation: Orientation,
        viewport: UVec2,
    ) {
        self.vertices = image_plane_vertices(&camera.viewport_to_image(orientation, viewport));
        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&self.vertices));
        self.recomputes += 1;
        log::debug!("Image plane updated for {}x{} ({})", viewport.x, viewport.y, orientation);
    }

    pub fn vertices(&self) -> &[ImagePlaneVertex; 4] {
        &self.vertices
    }

    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::test_support;

    const MAX: u32 = 8192;

    #[test]
    fn test_validate_requires_two_planes_and_depth() {
        let frame = test_support::frame();
        assert_eq!(validate_captured_image(&frame, MAX), Ok(()));

        let mut one_plane = test_support::frame();
        one_plane.captured_image.planes.truncate(1);
        assert_eq!(
            validate_captured_image(&one_plane, MAX),
            Err(SkipReason::MissingPlanes { found: 1 })
        );

        let mut no_depth = test_support::frame();
        no_depth.depth = None;
        assert_eq!(validate_captured_image(&no_depth, MAX), Err(SkipReason::MissingDepth));
    }

    #[test]
    fn test_validate_rejects_truncated_data() {
        let mut frame = test_support::frame();
        frame.captured_image.planes[1].data = frame.captured_image.planes[1].data.slice(..10);
        assert_eq!(
            validate_captured_image(&frame, MAX),
            Err(SkipReason::MalformedPlane { plane: 1 })
        );

        let mut frame = test_support::frame();
        if let Some(depth) = frame.depth.as_mut() {
            depth.data = depth.data[..5].into();
        }
        assert_eq!(validate_captured_image(&frame, MAX), Err(SkipReason::MalformedDepth));
    }

    #[test]
    fn test_validate_rejects_planes_over_texture_limit() {
        // 64x48 luma, 32x24 chroma, 64x48 depth.
        let frame = test_support::frame();
        assert_eq!(validate_captured_image(&frame, 64), Ok(()));
        assert_eq!(
            validate_captured_image(&frame, 63),
            Err(SkipReason::PlaneTooLarge { plane: LUMA_PLANE, max: 63 })
        );

        let mut frame = test_support::frame();
        frame.captured_image.planes[CHROMA_PLANE].height = 100;
        assert_eq!(
            validate_captured_image(&frame, 64),
            Err(SkipReason::PlaneTooLarge { plane: CHROMA_PLANE, max: 64 })
        );

        // Oversized declared sizes are caught before the byte-length check.
        let mut frame = test_support::frame();
        if let Some(depth) = frame.depth.as_mut() {
            depth.width = 65;
        }
        assert_eq!(
            validate_captured_image(&frame, 64),
            Err(SkipReason::PlaneTooLarge { plane: DEPTH_PLANE, max: 64 })
        );
    }

    #[test]
    fn test_viewport_dirty_only_on_change() {
        let mut vp = ViewportState::new(720, 1280);
        assert!(vp.take_dirty());
        assert!(!vp.take_dirty());

        assert!(!vp.resize(720, 1280));
        assert!(!vp.take_dirty());

        assert!(vp.resize(1280, 720));
        assert!(vp.take_dirty());
        assert!(!vp.is_dirty());
    }

    #[test]
    fn test_image_plane_vertices_idempotent() {
        let frame = test_support::frame();
        let viewport = UVec2::new(720, 1280);
        let t = frame.camera.viewport_to_image(Orientation::Portrait, viewport);
        let a = image_plane_vertices(&t);
        let b = image_plane_vertices(&t);
        assert_eq!(a, b);

        // Positions never move, only texture coordinates do.
        for (v, (pos, _)) in a.iter().zip(IMAGE_PLANE_CORNERS) {
            assert_eq!(v.position, pos);
        }
        // Identity leaves the corner UVs as they are.
        let ident = image_plane_vertices(&Affine2::IDENTITY);
        for (v, (_, uv)) in ident.iter().zip(IMAGE_PLANE_CORNERS) {
            assert_eq!(v.tex_coord, uv);
        }
    }

    fn gpu() -> Option<crate::renderer::context::GfxContext> {
        pollster::block_on(crate::renderer::context::GfxContext::headless()).ok()
    }

    #[test]
    fn test_update_captured_textures_on_gpu() {
        let Some(gfx) = gpu() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let mut pipeline = TexturePipeline::new(&gfx.device);

        let good = test_support::frame();
        let built = pipeline
            .update_captured_textures(&gfx.device, &gfx.queue, &good)
            .unwrap();
        assert_eq!(built.luma.width(), 64);
        assert_eq!(built.chroma.format(), wgpu::TextureFormat::Rg8Unorm);
        assert_eq!(built.depth.format(), wgpu::TextureFormat::R32Float);

        let mut bad = test_support::frame();
        bad.timestamp = 2.0;
        bad.captured_image.planes.truncate(1);
        let err = pipeline
            .update_captured_textures(&gfx.device, &gfx.queue, &bad)
            .err();
        assert_eq!(err, Some(SkipReason::MissingPlanes { found: 1 }));

        // The previous textures are untouched.
        let current = pipeline.current().unwrap();
        assert!(Arc::ptr_eq(current, &built));
        assert_eq!(current.timestamp, 1.0);
    }

    #[test]
    fn test_image_plane_recompute_counter() {
        let Some(gfx) = gpu() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let frame = test_support::frame();
        let mut plane = ImagePlaneGeometry::new(&gfx.device);
        let mut viewport = ViewportState::new(720, 1280);

        for size in [(720, 1280), (720, 1280), (1280, 720), (1280, 720)] {
            viewport.resize(size.0, size.1);
            if viewport.take_dirty() {
                plane.update(&gfx.queue, &frame.camera, Orientation::Portrait, viewport.size());
            }
        }
        assert_eq!(plane.recompute_count(), 2);

        let before = *plane.vertices();
        plane.update(&gfx.queue, &frame.camera, Orientation::Portrait, viewport.size());
        assert_eq!(&before, plane.vertices());
    }
}
