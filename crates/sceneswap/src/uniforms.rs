//! GPU data layouts shared with the WGSL shaders.

/// Maximum number of anchors rendered per frame.
pub const MAX_ANCHOR_INSTANCES: usize = 64;

/// Per-frame camera, lighting and compositing parameters.
/// Must match `SharedUniforms` in `shaders/common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct SharedUniforms {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub ambient_light_color: [f32; 3],
    pub material_shininess: f32,
    pub directional_light_direction: [f32; 3],
    /// Eye-space distance beyond which captured pixels count as background.
    pub cutoff_distance: f32,
    pub directional_light_color: [f32; 3],
    /// 0 shows only the capture, 1 replaces the background with the backdrop.
    pub mix_factor: f32,
}

const _: [(); 176] = [(); std::mem::size_of::<SharedUniforms>()];

/// Model matrix for one rendered anchor.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceUniforms {
    pub model: [[f32; 4]; 4],
}

/// Size in bytes of one slot's instance block.
pub const INSTANCE_BLOCK_SIZE: usize =
    std::mem::size_of::<InstanceUniforms>() * MAX_ANCHOR_INSTANCES;

const _: [(); 4096] = [(); INSTANCE_BLOCK_SIZE];

/// Vertex of the full-screen captured image plane.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ImagePlaneVertex {
    /// Clip-space position.
    pub position: [f32; 2],
    /// Normalized captured-image coordinate.
    pub tex_coord: [f32; 2],
}

/// Vertex of the anchor mesh.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tex_coord: [f32; 2],
}

const _: [(); 32] = [(); std::mem::size_of::<MeshVertex>()];

impl MeshVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

impl ImagePlaneVertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ImagePlaneVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
