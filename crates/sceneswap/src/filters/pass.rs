//! Full-screen fragment pass shared by the filters.

use wgpu::util::DeviceExt;

/// Full-screen triangle vertices
const FS_TRI: [[f32; 2]; 3] = [[-1.0, -1.0], [3.0, -1.0], [-1.0, 3.0]];

/// Vertex stage and texel helpers every filter shader is prefixed with.
const FULLSCREEN_PRELUDE: &str = include_str!("../../shaders/filters/fullscreen.wgsl");

pub(crate) fn fullscreen_vertices(device: &wgpu::Device, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&FS_TRI),
        usage: wgpu::BufferUsages::VERTEX,
    })
}

/// Pipeline drawing [`FS_TRI`] with `vs_main`/`fs_main` from `shader` into
/// one unblended colour target.
pub(crate) fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    layout: &wgpu::BindGroupLayout,
    out_fmt: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<[f32; 2]>() as u64,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2],
            }],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(out_fmt.into())],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
    })
}

pub(super) fn filter_shader(device: &wgpu::Device, label: &str, body: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(format!("{FULLSCREEN_PRELUDE}\n{body}").into()),
    })
}

/// A fragment pass reading `@group(0) @binding(0)` and, when the filter has
/// parameters, a uniform block at binding 1. Parameters are fixed at
/// construction.
pub(super) struct FilterPass {
    label: &'static str,
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: Option<wgpu::Buffer>,
    fs_vbo: wgpu::Buffer,
}

impl FilterPass {
    pub fn new(
        device: &wgpu::Device,
        out_fmt: wgpu::TextureFormat,
        label: &'static str,
        shader_body: &str,
        params: Option<&[u8]>,
    ) -> Self {
        Self::with_extra_entries(device, out_fmt, label, shader_body, params, &[])
    }

    /// Like [`FilterPass::new`] with additional bind group entries after the
    /// parameter block (bindings 2 and up).
    pub fn with_extra_entries(
        device: &wgpu::Device,
        out_fmt: wgpu::TextureFormat,
        label: &'static str,
        shader_body: &str,
        params: Option<&[u8]>,
        extra: &[wgpu::BindGroupLayoutEntry],
    ) -> Self {
        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }];
        if let Some(bytes) = params {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(bytes.len() as u64),
                },
                count: None,
            });
        }
        entries.extend_from_slice(extra);

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &entries,
        });
        let shader = filter_shader(device, label, shader_body);
        let pipeline = fullscreen_pipeline(device, label, &shader, &layout, out_fmt);

        let params = params.map(|bytes| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytes,
                usage: wgpu::BufferUsages::UNIFORM,
            })
        });

        let fs_vbo = fullscreen_vertices(device, label);

        Self {
            label,
            pipeline,
            layout,
            params,
            fs_vbo,
        }
    }

    pub fn draw(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &wgpu::TextureView,
        dst: &wgpu::TextureView,
    ) {
        self.draw_with(device, encoder, src, dst, &[]);
    }

    /// Draws with extra bind group entries matching the ones given at
    /// construction.
    pub fn draw_with(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        src: &wgpu::TextureView,
        dst: &wgpu::TextureView,
        extra: &[wgpu::BindGroupEntry<'_>],
    ) {
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::TextureView(src),
        }];
        if let Some(ubo) = &self.params {
            entries.push(wgpu::BindGroupEntry {
                binding: 1,
                resource: ubo.as_entire_binding(),
            });
        }
        entries.extend_from_slice(extra);

        let bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.layout,
            entries: &entries,
        });
        execute_pass(&self.pipeline, encoder, &bind, &self.fs_vbo, dst, self.label);
    }
}

pub(crate) fn execute_pass(
    pipeline: &wgpu::RenderPipeline,
    encoder: &mut wgpu::CommandEncoder,
    bind_group: &wgpu::BindGroup,
    fs_vbo: &wgpu::Buffer,
    dst: &wgpu::TextureView,
    label: &str,
) {
    let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: dst,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    rpass.set_pipeline(pipeline);
    rpass.set_bind_group(0, bind_group, &[]);
    rpass.set_vertex_buffer(0, fs_vbo.slice(..));
    rpass.draw(0..3, 0..1);
}
