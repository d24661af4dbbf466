//! Where finished frames go: a window surface or an offscreen texture.

use crate::error::{RenderError, Result};

/// A texture to draw one frame into. Call [`Drawable::present`] after the
/// frame's commands are submitted.
pub struct Drawable {
    pub view: wgpu::TextureView,
    surface_texture: Option<wgpu::SurfaceTexture>,
}

impl Drawable {
    pub fn present(self) {
        if let Some(texture) = self.surface_texture {
            texture.present();
        }
    }
}

/// Output the compositor presents into.
pub trait RenderDestination {
    fn format(&self) -> wgpu::TextureFormat;

    fn size(&self) -> (u32, u32);

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32);

    /// Next drawable, or `None` when none is available this cycle.
    fn acquire(&mut self, device: &wgpu::Device) -> Option<Drawable>;
}

/// Presents into a window surface.
pub struct SurfaceDestination {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
}

impl SurfaceDestination {
    pub fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        device: &wgpu::Device,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        let caps = surface.get_capabilities(adapter);
        // The pipeline works on gamma-encoded values end to end, so prefer a
        // non-sRGB surface.
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| !f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or(RenderError::UnsupportedSurface)?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage:                         wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width:                         width.max(1),
            height:                        height.max(1),
            present_mode:                  wgpu::PresentMode::Fifo, // V-sync
            alpha_mode,
            view_formats:                  vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(device, &config);
        log::info!("Surface configured: {:?} {}x{}", format, config.width, config.height);

        Ok(Self { surface, config })
    }
}

impl RenderDestination for SurfaceDestination {
    fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(device, &self.config);
        }
    }

    fn acquire(&mut self, device: &wgpu::Device) -> Option<Drawable> {
        match self.surface.get_current_texture() {
            Ok(frame) => Some(Drawable {
                view: frame.texture.create_view(&wgpu::TextureViewDescriptor::default()),
                surface_texture: Some(frame),
            }),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::debug!("Surface lost or outdated; reconfiguring");
                self.surface.configure(device, &self.config);
                None
            }
            Err(wgpu::SurfaceError::Timeout) => None,
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("Surface out of memory");
                None
            }
        }
    }
}

/// Renders into a texture; used headless and in tests.
pub struct OffscreenDestination {
    texture: wgpu::Texture,
    format: wgpu::TextureFormat,
    acquired: u64,
}

impl OffscreenDestination {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        Self {
            texture: Self::create(device, format, width, height),
            format,
            acquired: 0,
        }
    }

    fn create(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Destination"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }

    /// Drawables handed out so far.
    pub fn acquired_count(&self) -> u64 {
        self.acquired
    }
}

impl RenderDestination for OffscreenDestination {
    fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        if (width, height) != self.size() && width > 0 && height > 0 {
            self.texture = Self::create(device, self.format, width, height);
        }
    }

    fn acquire(&mut self, _device: &wgpu::Device) -> Option<Drawable> {
        self.acquired += 1;
        Some(Drawable {
            view: self.texture.create_view(&wgpu::TextureViewDescriptor::default()),
            surface_texture: None,
        })
    }
}
