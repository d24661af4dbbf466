use crate::assets::{MeshData, Submesh};
use wgpu::util::DeviceExt;

/// The anchor mesh on the GPU.
pub struct GpuMesh {
    pub name: String,
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub submeshes: Vec<Submesh>,
    pub vertex_count: usize,
}

impl GpuMesh {
    pub fn upload(device: &wgpu::Device, mesh: &MeshData) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Anchor Mesh VB"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Anchor Mesh IB"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            name: mesh.name.clone(),
            vertex_buffer,
            index_buffer,
            submeshes: mesh.submeshes.clone(),
            vertex_count: mesh.vertices.len(),
        }
    }

    pub fn index_count(&self) -> u32 {
        self.submeshes.last().map_or(0, |s| s.indices.end)
    }
}

/// Holds the current anchor mesh; reloading it leaves every pipeline alone.
#[derive(Default)]
pub struct MeshCache {
    current: Option<GpuMesh>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, device: &wgpu::Device, mesh: &MeshData) {
        let gpu = GpuMesh::upload(device, mesh);
        log::info!(
            "Anchor mesh '{}' loaded: {} vertices, {} triangles, {} submeshes",
            gpu.name,
            gpu.vertex_count,
            mesh.triangle_count(),
            gpu.submeshes.len()
        );
        self.current = Some(gpu);
    }

    pub fn current(&self) -> Option<&GpuMesh> {
        self.current.as_ref()
    }
}
