use super::with_common;
use crate::{renderer::mesh::GpuMesh, uniforms::MeshVertex};
use std::ops::Range;

/// Draws the anchor mesh once per anchor, textured with the backdrop.
pub struct AnchorPipeline {
    pub pipeline: wgpu::RenderPipeline,
}

impl AnchorPipeline {
    pub fn new(
        device: &wgpu::Device,
        ring_layout: &wgpu::BindGroupLayout,
        backdrop_layout: &wgpu::BindGroupLayout,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/anchor.wgsl"),
            source: wgpu::ShaderSource::Wgsl(with_common!("anchor.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Anchor PipelineLayout"),
            bind_group_layouts: &[ring_layout, backdrop_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Anchor Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[MeshVertex::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                // The model matrix mirrors Z, which flips the mesh's winding.
                front_face: wgpu::FrontFace::Cw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self { pipeline }
    }

    /// Draws every submesh of `mesh` for `instances`.
    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        ring_bind: &'a wgpu::BindGroup,
        ring_offsets: &[u32],
        backdrop_bind: &'a wgpu::BindGroup,
        mesh: &'a GpuMesh,
        instances: Range<u32>,
    ) {
        if instances.is_empty() {
            return;
        }
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, ring_bind, ring_offsets);
        rpass.set_bind_group(1, backdrop_bind, &[]);
        rpass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        rpass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for submesh in &mesh.submeshes {
            rpass.draw_indexed(submesh.indices.clone(), 0, instances.clone());
        }
    }
}
