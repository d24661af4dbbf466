//! Max/min over a disc: bokeh-style dilation and closing.

use super::{pass::FilterPass, FilterContext, FilterKind, ImageFilter};

pub const BOKEH_RADIUS: i32 = 4;
pub const CLOSING_RADIUS: i32 = 2;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct MorphParams {
    radius: i32,
    /// 0 takes the maximum, 1 the minimum.
    erode: u32,
    _pad: [u32; 2],
}

fn morph_pass(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    label: &'static str,
    radius: i32,
    erode: bool,
) -> FilterPass {
    let params = MorphParams {
        radius,
        erode: erode as u32,
        _pad: [0; 2],
    };
    FilterPass::new(
        device,
        format,
        label,
        include_str!("../../shaders/filters/morphology.wgsl"),
        Some(bytemuck::bytes_of(&params)),
    )
}

pub struct DilateFilter {
    pass: FilterPass,
}

impl DilateFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        Self {
            pass: morph_pass(device, format, "Dilate Bokeh Filter", BOKEH_RADIUS, false),
        }
    }
}

impl ImageFilter for DilateFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::DilateBokeh
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

/// Dilation followed by erosion, through the scratch target.
pub struct ClosingFilter {
    dilate: FilterPass,
    erode: FilterPass,
}

impl ClosingFilter {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        Self {
            dilate: morph_pass(device, format, "Closing Dilate", CLOSING_RADIUS, false),
            erode: morph_pass(device, format, "Closing Erode", CLOSING_RADIUS, true),
        }
    }
}

impl ImageFilter for ClosingFilter {
    fn kind(&self) -> FilterKind {
        FilterKind::MorphologyClosing
    }

    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.dilate.draw(ctx.device, encoder, source, ctx.scratch);
        self.erode.draw(ctx.device, encoder, ctx.scratch, destination);
    }
}
