use super::with_common;
use crate::uniforms::ImagePlaneVertex;

/// Draws the camera feed over the anchor geometry, letting the backdrop show
/// through wherever the depth sample is background.
pub struct CapturedImagePipeline {
    pub pipeline: wgpu::RenderPipeline,
}

impl CapturedImagePipeline {
    pub fn new(
        device: &wgpu::Device,
        ring_layout: &wgpu::BindGroupLayout,
        captured_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/captured_image.wgsl"),
            source: wgpu::ShaderSource::Wgsl(with_common!("captured_image.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Captured Image PipelineLayout"),
            bind_group_layouts: &[ring_layout, captured_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Captured Image Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[ImagePlaneVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                cull_mode: None,
                ..Default::default()
            },
            // Always passes and never writes: the plane sits on top of
            // everything and leaves the anchor depth intact.
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: false,
                depth_compare: wgpu::CompareFunction::Always,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline }
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        ring_bind: &'a wgpu::BindGroup,
        ring_offsets: &[u32],
        captured_bind: &'a wgpu::BindGroup,
        vertex_buffer: &'a wgpu::Buffer,
    ) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, ring_bind, ring_offsets);
        rpass.set_bind_group(1, captured_bind, &[]);
        rpass.set_vertex_buffer(0, vertex_buffer.slice(..));
        rpass.draw(0..4, 0..1);
    }
}
