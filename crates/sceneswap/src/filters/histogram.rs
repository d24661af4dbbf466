//! Histogram equalization and specification.
//!
//! Three steps per encode: a compute pass counts 256 bins per channel, a
//! second builds a lookup table from the cumulative counts, and a fragment
//! pass remaps every texel through the table.

use super::{pass::FilterPass, FilterContext, FilterKind, ImageFilter};
use wgpu::util::DeviceExt;

pub const HISTOGRAM_BINS: usize = 256;
const CHANNELS: usize = 3;
const WORKGROUP: u32 = 16;

pub const DEFAULT_TARGET_MEAN: f32 = 0.5;
pub const DEFAULT_TARGET_SIGMA: f32 = 0.18;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HistogramMode {
    /// Remap through the image's own cumulative distribution.
    Equalization,
    /// Match the image's distribution onto a Gaussian one.
    Specification { mean: f32, sigma: f32 },
}

impl HistogramMode {
    pub fn specification_default() -> Self {
        HistogramMode::Specification {
            mean: DEFAULT_TARGET_MEAN,
            sigma: DEFAULT_TARGET_SIGMA,
        }
    }
}

/// Cumulative distribution of a Gaussian sampled at the bin centres,
/// normalised so the last bin is exactly 1.
pub fn gaussian_target_cdf(mean: f32, sigma: f32) -> [f32; HISTOGRAM_BINS] {
    let sigma = sigma.max(1e-3);
    let mut cdf = [0.0f32; HISTOGRAM_BINS];
    let mut total = 0.0f64;
    for (i, slot) in cdf.iter_mut().enumerate() {
        let x = (i as f32 + 0.5) / HISTOGRAM_BINS as f32;
        let z = (x - mean) / sigma;
        total += (-0.5 * z * z).exp() as f64;
        *slot = total as f32;
    }
    let total = total as f32;
    for slot in cdf.iter_mut() {
        *slot /= total;
    }
    cdf[HISTOGRAM_BINS - 1] = 1.0;
    cdf
}

fn uniform_target_cdf() -> [f32; HISTOGRAM_BINS] {
    std::array::from_fn(|i| (i + 1) as f32 / HISTOGRAM_BINS as f32)
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct LutParams {
    /// 0 equalizes, 1 matches the target distribution.
    mode: u32,
    _pad: [u32; 3],
}

fn storage_entry(binding: u32, visibility: wgpu::ShaderStages, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct HistogramFilter {
    kind: FilterKind,
    bins: wgpu::Buffer,
    lut: wgpu::Buffer,
    accumulate: wgpu::ComputePipeline,
    accumulate_layout: wgpu::BindGroupLayout,
    build_lut: wgpu::ComputePipeline,
    build_lut_bind: wgpu::BindGroup,
    map: FilterPass,
}

impl HistogramFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, mode: HistogramMode) -> Self {
        let (kind, label, target, mode_id) = match mode {
            HistogramMode::Equalization => (
                FilterKind::HistogramEqualization,
                "Histogram Equalization",
                uniform_target_cdf(),
                0u32,
            ),
            HistogramMode::Specification { mean, sigma } => (
                FilterKind::HistogramSpecification,
                "Histogram Specification",
                gaussian_target_cdf(mean, sigma),
                1u32,
            ),
        };

        let table_size = (HISTOGRAM_BINS * CHANNELS * std::mem::size_of::<u32>()) as u64;
        let bins = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Histogram Bins"),
            size: table_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lut = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Histogram LUT"),
            size: table_size,
            usage: wgpu::BufferUsages::STORAGE,
            mapped_at_creation: false,
        });
        let target = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Histogram Target CDF"),
            contents: bytemuck::cast_slice(&target),
            usage: wgpu::BufferUsages::STORAGE,
        });
        let params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Histogram LUT Params"),
            contents: bytemuck::bytes_of(&LutParams {
                mode: mode_id,
                _pad: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        // Accumulate: source texture -> atomic bins.
        let accumulate_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Histogram Accumulate Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                storage_entry(1, wgpu::ShaderStages::COMPUTE, false),
            ],
        });
        let accumulate_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/histogram_accumulate.wgsl"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../../shaders/histogram_accumulate.wgsl").into(),
            ),
        });
        let accumulate = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Histogram Accumulate"),
            layout: Some(&device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Histogram Accumulate PipelineLayout"),
                bind_group_layouts: &[&accumulate_layout],
                push_constant_ranges: &[],
            })),
            module: &accumulate_shader,
            entry_point: "accumulate",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        // Build LUT: bins + target CDF -> lookup table.
        let build_lut_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Histogram LUT Layout"),
            entries: &[
                storage_entry(0, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(1, wgpu::ShaderStages::COMPUTE, true),
                storage_entry(2, wgpu::ShaderStages::COMPUTE, false),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<LutParams>() as u64),
                    },
                    count: None,
                },
            ],
        });
        let lut_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/histogram_lut.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/histogram_lut.wgsl").into()),
        });
        let build_lut = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Histogram Build LUT"),
            layout: Some(&device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Histogram LUT PipelineLayout"),
                bind_group_layouts: &[&build_lut_layout],
                push_constant_ranges: &[],
            })),
            module: &lut_shader,
            entry_point: "build_lut",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });
        let build_lut_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Histogram LUT Bind"),
            layout: &build_lut_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: bins.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: target.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: lut.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: params.as_entire_binding(),
                },
            ],
        });

        // Map: source texture + LUT -> destination.
        let map = FilterPass::with_extra_entries(
            device,
            format,
            label,
            include_str!("../../shaders/filters/histogram_map.wgsl"),
            None,
            &[storage_entry(2, wgpu::ShaderStages::FRAGMENT, true)],
        );

        Self {
            kind,
            bins,
            lut,
            accumulate,
            accumulate_layout,
            build_lut,
            build_lut_bind,
            map,
        }
    }
}

impl ImageFilter for HistogramFilter {
    fn kind(&self) -> FilterKind {
        self.kind
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        encoder.clear_buffer(&self.bins, 0, None);

        let accumulate_bind = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Histogram Accumulate Bind"),
            layout: &self.accumulate_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.bins.as_entire_binding(),
                },
            ],
        });

        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Histogram Compute"),
                timestamp_writes: None,
            });
            cpass.set_pipeline(&self.accumulate);
            cpass.set_bind_group(0, &accumulate_bind, &[]);
            cpass.dispatch_workgroups(ctx.width.div_ceil(WORKGROUP), ctx.height.div_ceil(WORKGROUP), 1);

            cpass.set_pipeline(&self.build_lut);
            cpass.set_bind_group(0, &self.build_lut_bind, &[]);
            cpass.dispatch_workgroups(1, 1, 1);
        }

        self.map.draw_with(
            ctx.device,
            encoder,
            source,
            destination,
            &[wgpu::BindGroupEntry {
                binding: 2,
                resource: self.lut.as_entire_binding(),
            }],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_target_cdf_is_monotonic() {
        let cdf = gaussian_target_cdf(DEFAULT_TARGET_MEAN, DEFAULT_TARGET_SIGMA);
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        assert!(cdf[0] > 0.0 && cdf[0] < 0.01);
        assert_eq!(cdf[HISTOGRAM_BINS - 1], 1.0);
        // Symmetric around the mean: half the mass sits below bin 128.
        assert!((cdf[127] - 0.5).abs() < 0.01, "cdf[127] = {}", cdf[127]);
    }

    #[test]
    fn test_gaussian_target_cdf_shifts_with_mean() {
        let dark = gaussian_target_cdf(0.3, 0.1);
        let bright = gaussian_target_cdf(0.7, 0.1);
        assert!(dark[127] > 0.9);
        assert!(bright[127] < 0.1);
    }

    #[test]
    fn test_uniform_target_cdf() {
        let cdf = uniform_target_cdf();
        assert_eq!(cdf[0], 1.0 / 256.0);
        assert_eq!(cdf[255], 1.0);
    }
}
