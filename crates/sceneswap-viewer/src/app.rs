use crate::{
    config::Config,
    synthetic::SyntheticSession,
    ui::{self, UiActions, UiState},
};
use anyhow::{Context, Result};
use sceneswap::{
    assets::{IMAGE_EXTENSIONS, MESH_EXTENSIONS},
    renderer::{RenderDestination, SurfaceDestination},
    BackdropSource, Compositor, DirAssetStore, FilterKind, FrameOutcome, FrameOverlay, GfxContext,
    LightingMode, RenderControls, RendererConfig,
};
use std::{path::PathBuf, sync::Arc};
use winit::{
    event::{ElementState, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

/// Paints one tessellated egui frame over the drawable.
struct EguiOverlay<'a> {
    renderer: &'a mut egui_wgpu::Renderer,
    shapes: &'a [egui::ClippedPrimitive],
    textures: &'a egui::TexturesDelta,
    pixels_per_point: f32,
    drawn: bool,
}

impl EguiOverlay<'_> {
    fn upload_textures(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        for (id, delta) in &self.textures.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }
    }

    fn free_textures(&mut self) {
        for id in &self.textures.free {
            self.renderer.free_texture(id);
        }
    }
}

impl FrameOverlay for EguiOverlay<'_> {
    fn draw(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        size: (u32, u32),
    ) -> Vec<wgpu::CommandBuffer> {
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [size.0, size.1],
            pixels_per_point: self.pixels_per_point,
        };

        self.upload_textures(device, queue);
        // Paint callback work, if any; the compositor submits it first.
        let callback_buffers = self
            .renderer
            .update_buffers(device, queue, encoder, self.shapes, &screen_descriptor);

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.renderer
                .render(&mut render_pass, self.shapes, &screen_descriptor);
        }

        self.free_textures();
        self.drawn = true;
        callback_buffers
    }
}

pub struct App {
    pub compositor: Compositor<SurfaceDestination>,
    pub session: SyntheticSession,
    pub controls: Arc<RenderControls>,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,
    pub ui: UiState,
    backdrops: Vec<String>,
    objects: Vec<String>,
    capture_dir: PathBuf,
    anchor_distance: f32,
}

impl App {
    pub async fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;
        let gfx = GfxContext::for_surface(instance, &surface).await?;
        let destination =
            SurfaceDestination::new(surface, &gfx.adapter, &gfx.device, size.width, size.height)?;

        let assets = DirAssetStore::new(&config.assets)
            .with_context(|| format!("opening asset directory {}", config.assets.display()))?;
        let backdrops = assets.names(IMAGE_EXTENSIONS);
        let objects = assets.names(MESH_EXTENSIONS);

        let session = SyntheticSession::start(config.tracking_hz);
        let controls = Arc::new(RenderControls::new(config.mix, config.filter));
        let renderer_config = RendererConfig {
            orientation: config.orientation,
            lighting: if config.estimated_lighting {
                LightingMode::Estimated
            } else {
                LightingMode::Static
            },
        };

        let compositor = Compositor::new(
            gfx,
            destination,
            session.frames(),
            Arc::new(assets),
            controls.clone(),
            renderer_config,
            &config.object,
            BackdropSource::named(&config.backdrop),
        )?;

        let egui_renderer = egui_wgpu::Renderer::new(
            &compositor.gfx().device,
            compositor.destination().format(),
            None,
            1,
        );
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let ui = UiState {
            mix: controls.mix_factor(),
            filter: controls.active_filter(),
            orientation: config.orientation,
            backdrop: compositor.backdrop_name().to_string(),
            object: compositor.object_name().to_string(),
            last_message: None,
        };

        Ok(Self {
            compositor,
            session,
            controls,
            egui_ctx,
            egui_state,
            egui_renderer,
            ui,
            backdrops,
            objects,
            capture_dir: config.capture_dir.clone(),
            anchor_distance: config.anchor_distance,
        })
    }

    /// Returns true when the event was consumed.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(size) => {
                self.compositor.on_viewport_resize(size.width, size.height);
                false
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::KeyC) => {
                        self.capture();
                        true
                    }
                    PhysicalKey::Code(KeyCode::Space) => {
                        self.session.add_anchor(self.anchor_distance);
                        true
                    }
                    PhysicalKey::Code(KeyCode::Tab) => {
                        self.cycle_filter();
                        true
                    }
                    _ => false,
                }
            }
            // A tap anywhere outside the panel places an anchor.
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.session.add_anchor(self.anchor_distance);
                true
            }
            _ => false,
        }
    }

    fn cycle_filter(&mut self) {
        let next = (self.controls.active_filter().index() + 1) % FilterKind::ALL.len();
        if let Some(kind) = FilterKind::from_index(next) {
            self.controls.set_active_filter(kind);
            self.ui.filter = kind;
            log::info!("Filter: {kind}");
        }
    }

    fn capture(&mut self) {
        let message = match self.save_capture() {
            Ok(path) => format!("Saved {}", path.display()),
            Err(err) => {
                log::warn!("Capture failed: {err:#}");
                format!("Capture failed: {err}")
            }
        };
        self.ui.last_message = Some(message);
    }

    fn save_capture(&self) -> Result<PathBuf> {
        let capture = self.compositor.capture_frame()?;
        std::fs::create_dir_all(&self.capture_dir)
            .with_context(|| format!("creating {}", self.capture_dir.display()))?;
        let name = format!("capture-{}.png", chrono::Local::now().format("%Y%m%d-%H%M%S%.3f"));
        let path = self.capture_dir.join(name);
        capture.save_png(&path)?;
        log::info!(
            "Captured frame {:.3} ({}x{}) to {}",
            capture.timestamp,
            capture.image.width(),
            capture.image.height(),
            path.display()
        );
        Ok(path)
    }

    fn apply(&mut self, actions: UiActions) {
        self.controls.set_mix_factor(self.ui.mix);
        self.controls.set_active_filter(self.ui.filter);

        if let Some(orientation) = actions.orientation {
            self.compositor.set_orientation(orientation);
        }
        if let Some(name) = actions.backdrop {
            match self.compositor.set_image(BackdropSource::named(&name)) {
                Ok(()) => self.ui.backdrop = name,
                Err(err) => self.ui.last_message = Some(format!("Backdrop: {err}")),
            }
        }
        if let Some(name) = actions.object {
            match self.compositor.set_object(&name) {
                Ok(()) => self.ui.object = name,
                Err(err) => self.ui.last_message = Some(format!("Object: {err}")),
            }
        }
        if actions.add_anchor {
            self.session.add_anchor(self.anchor_distance);
        }
        if actions.clear_anchors {
            self.session.clear_anchors();
        }
        if actions.capture {
            self.capture();
        }
    }

    pub fn render(&mut self, window: &Window) -> FrameOutcome {
        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);

        ui::draw_hud(&self.egui_ctx, self.compositor.stats(), self.session.anchor_count());
        let actions = ui::draw_control_panel(&self.egui_ctx, &mut self.ui, &self.backdrops, &self.objects);

        let egui_output = self.egui_ctx.end_frame();
        self.apply(actions);

        let pixels_per_point = self.egui_ctx.pixels_per_point();
        let shapes = self.egui_ctx.tessellate(egui_output.shapes, pixels_per_point);

        let mut overlay = EguiOverlay {
            renderer: &mut self.egui_renderer,
            shapes: &shapes,
            textures: &egui_output.textures_delta,
            pixels_per_point,
            drawn: false,
        };
        let outcome = self.compositor.update_with_overlay(&mut overlay);

        // Skipped frames still have to keep egui's texture atlas current.
        if !overlay.drawn {
            let gfx = self.compositor.gfx();
            overlay.upload_textures(&gfx.device, &gfx.queue);
            overlay.free_textures();
        }

        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);
        outcome
    }
}
