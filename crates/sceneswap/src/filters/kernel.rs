//! Neighbourhood filters: copies, blurs, convolutions and edge detectors.

use super::{pass::FilterPass, FilterContext, FilterKind, ImageFilter};

pub const GAUSSIAN_SIGMA: f32 = 2.0;
pub const GAUSSIAN_RADIUS: i32 = 6;
pub const THRESHOLD: f32 = 0.5;

pub const LAPLACIAN_KERNEL: [[f32; 3]; 3] = [[0.0, 1.0, 0.0], [1.0, -4.0, 1.0], [0.0, 1.0, 0.0]];
pub const EMBOSS_KERNEL: [[f32; 3]; 3] = [[-2.0, -1.0, 0.0], [-1.0, 1.0, 1.0], [0.0, 1.0, 2.0]];
pub const SHARPEN_KERNEL: [[f32; 3]; 3] = [[0.0, -1.0, 0.0], [-1.0, 5.0, -1.0], [0.0, -1.0, 0.0]];

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    direction: [i32; 2],
    radius: i32,
    sigma: f32,
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct KernelParams {
    rows: [[f32; 4]; 3],
    bias: f32,
    absolute: u32,
    _pad: [u32; 2],
}

const _: [(); 64] = [(); std::mem::size_of::<KernelParams>()];

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ThresholdParams {
    threshold: f32,
    _pad: [f32; 3],
}

impl KernelParams {
    fn new(kernel: [[f32; 3]; 3], absolute: bool) -> Self {
        Self {
            rows: kernel.map(|[a, b, c]| [a, b, c, 0.0]),
            bias: 0.0,
            absolute: absolute as u32,
            _pad: [0; 2],
        }
    }
}

pub struct PassThroughFilter {
    pass: FilterPass,
}

impl PassThroughFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let body = include_str!("../../shaders/filters/passthrough.wgsl");
        Self {
            pass: FilterPass::new(device, format, "PassThrough Filter", body, None),
        }
    }
}

impl ImageFilter for PassThroughFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::PassThrough
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.pass.draw(ctx.device, encoder, source, destination);
    }
}

/// Separable Gaussian: horizontal into scratch, vertical into the destination.
pub struct GaussianBlurFilter {
    horizontal: FilterPass,
    vertical: FilterPass,
}

impl GaussianBlurFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let body = include_str!("../../shaders/filters/gaussian.wgsl");
        let params = |direction| BlurParams {
            direction,
            radius: GAUSSIAN_RADIUS,
            sigma: GAUSSIAN_SIGMA,
        };
        Self {
            horizontal: FilterPass::new(
                device,
                format,
                "Gaussian Blur H",
                body,
                Some(bytemuck::bytes_of(&params([1, 0]))),
            ),
            vertical: FilterPass::new(
                device,
                format,
                "Gaussian Blur V",
                body,
                Some(bytemuck::bytes_of(&params([0, 1]))),
            ),
        }
    }
}

impl ImageFilter for GaussianBlurFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::GaussianBlur
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.horizontal.draw(ctx.device, encoder, source, ctx.scratch);
        self.vertical.draw(ctx.device, encoder, ctx.scratch, destination);
    }
}

pub struct MedianFilter {
    pass: FilterPass,
}

impl MedianFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let body = include_str!("../../shaders/filters/median.wgsl");
        Self {
            pass: FilterPass::new(device, format, "Median Filter", body, None),
        }
    }
}

impl ImageFilter for MedianFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Median
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.pass.draw(ctx.device, encoder, source, destination);
    }
}

/// 3x3 convolution with a fixed kernel.
pub struct ConvolutionFilter {
    kind: FilterKind,
    pass: FilterPass,
}

impl ConvolutionFilter {
    fn with_kernel(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        kind: FilterKind,
        label: &'static str,
        params: KernelParams,
    ) -> Self {
        let body = include_str!("../../shaders/filters/convolution3x3.wgsl");
        Self {
            kind,
            pass: FilterPass::new(device, format, label, body, Some(bytemuck::bytes_of(&params))),
        }
    }

    /// Four-neighbour Laplacian, absolute response.
    pub fn laplacian(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let params = KernelParams::new(LAPLACIAN_KERNEL, true);
        Self::with_kernel(device, format, FilterKind::Laplacian, "Laplacian Filter", params)
    }

    pub fn emboss(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let params = KernelParams::new(EMBOSS_KERNEL, false);
        Self::with_kernel(device, format, FilterKind::ConvolutionEmboss, "Emboss Filter", params)
    }

    pub fn sharpen(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let params = KernelParams::new(SHARPEN_KERNEL, false);
        Self::with_kernel(device, format, FilterKind::ConvolutionSharpen, "Sharpen Filter", params)
    }
}

impl ImageFilter for ConvolutionFilter {
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
        self.pass.draw(ctx.device, encoder, source, destination);
    }
}

/// Sobel gradient magnitude of luminance, written as grey.
pub struct SobelFilter {
    pass: FilterPass,
}

impl SobelFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let body = include_str!("../../shaders/filters/sobel.wgsl");
        Self {
            pass: FilterPass::new(device, format, "Sobel Filter", body, None),
        }
    }
}

impl ImageFilter for SobelFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::Sobel
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.pass.draw(ctx.device, encoder, source, destination);
    }
}

/// Luminance above [`THRESHOLD`] becomes white, everything else black.
pub struct ThresholdFilter {
    pass: FilterPass,
}

impl ThresholdFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let body = include_str!("../../shaders/filters/threshold.wgsl");
        let params = ThresholdParams {
            threshold: THRESHOLD,
            _pad: [0.0; 3],
        };
        Self {
            pass: FilterPass::new(
                device,
                format,
                "Threshold Filter",
                body,
                Some(bytemuck::bytes_of(&params)),
            ),
        }
    }
}

impl ImageFilter for ThresholdFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::ThresholdBinary
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.pass.draw(ctx.device, encoder, source, destination);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel_sum(k: &[[f32; 3]; 3]) -> f32 {
        k.iter().flatten().sum()
    }

    #[test]
    fn test_kernel_weights() {
        // Sharpen and emboss preserve flat regions; the Laplacian zeroes them.
        assert_eq!(kernel_sum(&SHARPEN_KERNEL), 1.0);
        assert_eq!(kernel_sum(&EMBOSS_KERNEL), 1.0);
        assert_eq!(kernel_sum(&LAPLACIAN_KERNEL), 0.0);
    }

    #[test]
    fn test_kernel_params_layout() {
        let p = KernelParams::new(EMBOSS_KERNEL, true);
        assert_eq!(p.rows[0], [-2.0, -1.0, 0.0, 0.0]);
        assert_eq!(p.rows[2], [0.0, 1.0, 2.0, 0.0]);
        assert_eq!(p.absolute, 1);
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
        assert_eq!(std::mem::size_of::<ThresholdParams>(), 16);
    }
}
