//! Offscreen render targets for the scene pass and the filter stage.

/// Format of the scene colour target and every filter target.
pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct Targets {
    // Private textures – keep alive for the lifetime of the views.
    _scene_tex: wgpu::Texture,
    _depth_tex: wgpu::Texture,
    _scratch_tex: wgpu::Texture,
    output_tex: wgpu::Texture,

    /// Anchor geometry and the composited camera image.
    pub scene: wgpu::TextureView,
    pub depth: wgpu::TextureView,
    /// Result of the active filter; blitted to the drawable and read back
    /// for captures.
    pub output: wgpu::TextureView,
    /// Intermediate for multi-pass filters.
    pub scratch: wgpu::TextureView,

    pub width: u32,
    pub height: u32,
}

impl Targets {
    pub fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        // Ensure non-zero dimensions.
        let width = width.max(1);
        let height = height.max(1);

        let create_tex = |label: &str, format, usage| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage,
                view_formats: &[],
            })
        };

        let sampled = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        let scene_tex = create_tex("Scene Color Target", COLOR_FORMAT, sampled);
        let depth_tex = create_tex(
            "Scene Depth Target",
            DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
        );
        let scratch_tex = create_tex("Filter Scratch Target", COLOR_FORMAT, sampled);
        let output_tex = create_tex(
            "Filter Output Target",
            COLOR_FORMAT,
            sampled | wgpu::TextureUsages::COPY_SRC,
        );

        let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            scene: view(&scene_tex),
            depth: view(&depth_tex),
            output: view(&output_tex),
            scratch: view(&scratch_tex),
            _scene_tex: scene_tex,
            _depth_tex: depth_tex,
            _scratch_tex: scratch_tex,
            output_tex,
            width,
            height,
        }
    }

    /// Recreates the targets when the size actually changed.
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if self.width == width.max(1) && self.height == height.max(1) {
            return;
        }
        *self = Self::new(device, width, height);
    }

    pub fn output_texture(&self) -> &wgpu::Texture {
        &self.output_tex
    }
}
