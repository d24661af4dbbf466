//! Post-process filters applied to the composited scene.
//!
//! Every filter reads one `Rgba8Unorm` texture and writes another. All of
//! them are built up front by [`FilterBank::new`]; switching filters at
//! runtime only changes which one is encoded.

mod histogram;
mod kernel;
mod morphology;
pub(crate) mod pass;

pub use histogram::{gaussian_target_cdf, HistogramFilter, HistogramMode, HISTOGRAM_BINS};
pub use kernel::{ConvolutionFilter, GaussianBlurFilter, MedianFilter, PassThroughFilter, SobelFilter, ThresholdFilter};
pub use morphology::{ClosingFilter, DilateFilter};

use std::{fmt, str::FromStr};

/// The closed set of filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterKind {
    #[default]
    PassThrough,
    GaussianBlur,
    Median,
    Laplacian,
    Sobel,
    ThresholdBinary,
    ConvolutionEmboss,
    ConvolutionSharpen,
    DilateBokeh,
    MorphologyClosing,
    HistogramEqualization,
    HistogramSpecification,
}

impl FilterKind {
    pub const ALL: [FilterKind; 12] = [
        FilterKind::PassThrough,
        FilterKind::GaussianBlur,
        FilterKind::Median,
        FilterKind::Laplacian,
        FilterKind::Sobel,
        FilterKind::ThresholdBinary,
        FilterKind::ConvolutionEmboss,
        FilterKind::ConvolutionSharpen,
        FilterKind::DilateBokeh,
        FilterKind::MorphologyClosing,
        FilterKind::HistogramEqualization,
        FilterKind::HistogramSpecification,
    ];

    /// Position in [`FilterKind::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::PassThrough => "pass-through",
            FilterKind::GaussianBlur => "gaussian-blur",
            FilterKind::Median => "median",
            FilterKind::Laplacian => "laplacian",
            FilterKind::Sobel => "sobel",
            FilterKind::ThresholdBinary => "threshold-binary",
            FilterKind::ConvolutionEmboss => "emboss",
            FilterKind::ConvolutionSharpen => "sharpen",
            FilterKind::DilateBokeh => "dilate-bokeh",
            FilterKind::MorphologyClosing => "morphology-closing",
            FilterKind::HistogramEqualization => "histogram-equalization",
            FilterKind::HistogramSpecification => "histogram-specification",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown filter '{0}'")]
pub struct ParseFilterError(String);

impl FromStr for FilterKind {
    type Err = ParseFilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == wanted)
            .ok_or_else(|| ParseFilterError(s.to_string()))
    }
}

/// Per-encode inputs shared by every filter.
pub struct FilterContext<'a> {
    pub device: &'a wgpu::Device,
    /// Size of the source and destination textures.
    pub width: u32,
    pub height: u32,
    /// Intermediate target with the same size and format as the destination.
    pub scratch: &'a wgpu::TextureView,
}

/// An image-to-image transform.
pub trait ImageFilter: Send + Sync {
    fn kind(&self) -> FilterKind;

    /// Records the commands that turn `source` into `destination`.
    fn encode(
        &self,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    );
}

/// One filter per [`FilterKind`], indexed by [`FilterKind::index`].
pub struct FilterBank {
    filters: Vec<Box<dyn ImageFilter>>,
}

impl FilterBank {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let filters = FilterKind::ALL
            .into_iter()
            .map(|kind| build_filter(device, format, kind))
            .collect();
        log::debug!("Filter bank ready ({} filters)", FilterKind::ALL.len());
        Self { filters }
    }

    pub fn get(&self, kind: FilterKind) -> &dyn ImageFilter {
        self.filters[kind.index()].as_ref()
    }

    pub fn encode(
        &self,
        kind: FilterKind,
        ctx: &FilterContext<'_>,
        encoder: &mut wgpu::CommandEncoder,
        source: &wgpu::TextureView,
        destination: &wgpu::TextureView,
    ) {
        self.get(kind).encode(ctx, encoder, source, destination);
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn build_filter(device: &wgpu::Device, format: wgpu::TextureFormat, kind: FilterKind) -> Box<dyn ImageFilter> {
    match kind {
        FilterKind::PassThrough => Box::new(PassThroughFilter::new(device, format)),
        FilterKind::GaussianBlur => Box::new(GaussianBlurFilter::new(device, format)),
        FilterKind::Median => Box::new(MedianFilter::new(device, format)),
        FilterKind::Laplacian => Box::new(ConvolutionFilter::laplacian(device, format)),
        FilterKind::Sobel => Box::new(SobelFilter::new(device, format)),
        FilterKind::ThresholdBinary => Box::new(ThresholdFilter::new(device, format)),
        FilterKind::ConvolutionEmboss => Box::new(ConvolutionFilter::emboss(device, format)),
        FilterKind::ConvolutionSharpen => Box::new(ConvolutionFilter::sharpen(device, format)),
        FilterKind::DilateBokeh => Box::new(DilateFilter::new(device, format)),
        FilterKind::MorphologyClosing => Box::new(ClosingFilter::new(device, format)),
        FilterKind::HistogramEqualization => {
            Box::new(HistogramFilter::new(device, format, HistogramMode::Equalization))
        }
        FilterKind::HistogramSpecification => {
            Box::new(HistogramFilter::new(device, format, HistogramMode::specification_default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{capture::read_rgba_texture, context::GfxContext, targets::COLOR_FORMAT};
    use image::{Rgba, RgbaImage};
    use wgpu::util::DeviceExt;

    const SIZE: u32 = 16;

    struct Rig {
        gfx: GfxContext,
        bank: FilterBank,
    }

    impl Rig {
        /// Runs one filter over `source` and reads the destination back.
        fn apply(&self, kind: FilterKind, source: &RgbaImage) -> RgbaImage {
            let device = &self.gfx.device;
            let (width, height) = source.dimensions();
            let size = wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            };
            let desc = |label: &'static str, usage: wgpu::TextureUsages| wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: COLOR_FORMAT,
                usage,
                view_formats: &[],
            };

            let src = device.create_texture_with_data(
                &self.gfx.queue,
                &desc(
                    "Filter Test Source",
                    wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                ),
                wgpu::util::TextureDataOrder::LayerMajor,
                source.as_raw(),
            );
            let target = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
            let scratch = device.create_texture(&desc("Filter Test Scratch", target));
            let dst = device.create_texture(&desc(
                "Filter Test Output",
                target | wgpu::TextureUsages::COPY_SRC,
            ));

            let view = |t: &wgpu::Texture| t.create_view(&wgpu::TextureViewDescriptor::default());
            let (src_view, scratch_view, dst_view) = (view(&src), view(&scratch), view(&dst));
            let ctx = FilterContext {
                device,
                width,
                height,
                scratch: &scratch_view,
            };
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Filter Test Encoder"),
            });
            self.bank.encode(kind, &ctx, &mut encoder, &src_view, &dst_view);
            self.gfx.queue.submit(std::iter::once(encoder.finish()));

            read_rgba_texture(device, &self.gfx.queue, &dst).unwrap()
        }
    }

    fn rig() -> Option<Rig> {
        let gfx = pollster::block_on(GfxContext::headless()).ok()?;
        let bank = FilterBank::new(&gfx.device, COLOR_FORMAT);
        Some(Rig { gfx, bank })
    }

    macro_rules! gpu_rig {
        () => {
            match rig() {
                Some(r) => r,
                None => {
                    eprintln!("no GPU adapter, skipping");
                    return;
                }
            }
        };
    }

    fn grey(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    fn flat(v: u8) -> RgbaImage {
        RgbaImage::from_pixel(SIZE, SIZE, grey(v))
    }

    /// `base` everywhere except `v` at (8, 8).
    fn dot(base: u8, v: u8) -> RgbaImage {
        let mut image = flat(base);
        image.put_pixel(8, 8, grey(v));
        image
    }

    /// Columns left of `x0` take `left`, the rest `right`.
    fn step(x0: u32, left: u8, right: u8) -> RgbaImage {
        RgbaImage::from_fn(SIZE, SIZE, |x, _| grey(if x < x0 { left } else { right }))
    }

    fn at(image: &RgbaImage, x: u32, y: u32) -> u8 {
        image.get_pixel(x, y)[0]
    }

    fn near(actual: u8, expected: u8) -> bool {
        (actual as i32 - expected as i32).abs() <= 1
    }

    #[test]
    fn test_index_round_trips() {
        for (i, kind) in FilterKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
            assert_eq!(FilterKind::from_index(i), Some(kind));
        }
        assert_eq!(FilterKind::from_index(12), None);
        assert_eq!(FilterKind::default(), FilterKind::PassThrough);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("median".parse::<FilterKind>().unwrap(), FilterKind::Median);
        assert_eq!(" Gaussian_Blur ".parse::<FilterKind>().unwrap(), FilterKind::GaussianBlur);
        assert_eq!(
            "histogram-specification".parse::<FilterKind>().unwrap(),
            FilterKind::HistogramSpecification
        );
        let err = "vignette".parse::<FilterKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown filter 'vignette'");

        for kind in FilterKind::ALL {
            assert_eq!(kind.to_string().parse::<FilterKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_bank_builds_every_filter() {
        let Ok(gfx) = pollster::block_on(crate::renderer::context::GfxContext::headless()) else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let bank = FilterBank::new(&gfx.device, crate::renderer::targets::COLOR_FORMAT);
        assert_eq!(bank.len(), FilterKind::ALL.len());
        for kind in FilterKind::ALL {
            assert_eq!(bank.get(kind).kind(), kind);
        }
    }

    #[test]
    fn test_gaussian_blur_spreads_within_radius() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::GaussianBlur, &dot(0, 255));

        let centre = at(&out, 8, 8);
        assert!(centre > 0 && centre < 64, "centre {centre}");
        let side = at(&out, 9, 8);
        assert!(side > 0 && side <= centre, "side {side}");
        assert!(at(&out, 8, 9) > 0);
        // Seven texels away is past the kernel radius.
        assert_eq!(at(&out, 15, 8), 0);
        assert_eq!(at(&out, 8, 15), 0);
    }

    #[test]
    fn test_median_removes_isolated_spike() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::Median, &dot(100, 255));
        assert!(out.pixels().all(|p| p[0] == 100 && p[1] == 100 && p[2] == 100));
    }

    #[test]
    fn test_edge_filters_are_zero_on_flat_image() {
        let rig = gpu_rig!();
        for kind in [FilterKind::Laplacian, FilterKind::Sobel] {
            let out = rig.apply(kind, &flat(128));
            assert!(
                out.pixels().all(|p| p[0] == 0 && p[1] == 0 && p[2] == 0),
                "{kind}"
            );
        }
    }

    #[test]
    fn test_laplacian_reports_both_sides_of_a_step() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::Laplacian, &step(8, 0, 255));
        // +1 on the dark side, -1 on the bright side; both come out bright.
        assert_eq!(at(&out, 7, 8), 255);
        assert_eq!(at(&out, 8, 8), 255);
        assert_eq!(at(&out, 3, 8), 0);
        assert_eq!(at(&out, 12, 8), 0);
    }

    #[test]
    fn test_sobel_marks_step_edge() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::Sobel, &step(8, 0, 255));
        assert!(at(&out, 7, 8) >= 250);
        assert!(at(&out, 8, 8) >= 250);
        assert_eq!(at(&out, 3, 8), 0);
        assert_eq!(at(&out, 12, 8), 0);
        assert_eq!(out.get_pixel(3, 8)[3], 255);
    }

    #[test]
    fn test_unit_sum_kernels_keep_flat_image() {
        let rig = gpu_rig!();
        for kind in [FilterKind::ConvolutionEmboss, FilterKind::ConvolutionSharpen] {
            let out = rig.apply(kind, &flat(100));
            assert!(out.pixels().all(|p| near(p[0], 100)), "{kind}");
        }
    }

    #[test]
    fn test_sharpen_boosts_spike_and_darkens_neighbours() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::ConvolutionSharpen, &dot(100, 150));
        // 5 * 150 - 4 * 100 saturates; 5 * 100 - 150 - 3 * 100 = 50.
        assert_eq!(at(&out, 8, 8), 255);
        assert!(near(at(&out, 9, 8), 50), "{}", at(&out, 9, 8));
        assert!(near(at(&out, 8, 7), 50));
        assert!(near(at(&out, 3, 3), 100));
    }

    #[test]
    fn test_emboss_lights_rising_edges_only() {
        let rig = gpu_rig!();
        let rising = rig.apply(FilterKind::ConvolutionEmboss, &step(8, 0, 255));
        assert_eq!(at(&rising, 7, 8), 255);
        assert_eq!(at(&rising, 8, 8), 255);

        let falling = rig.apply(FilterKind::ConvolutionEmboss, &step(8, 255, 0));
        assert_eq!(at(&falling, 7, 8), 0);
        assert_eq!(at(&falling, 8, 8), 0);
        assert_eq!(at(&falling, 2, 8), 255);
    }

    #[test]
    fn test_dilate_spreads_over_radius_four_disc() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::DilateBokeh, &dot(0, 255));

        for (x, y) in [(8, 8), (12, 8), (4, 8), (8, 12), (8, 4), (11, 10)] {
            assert_eq!(at(&out, x, y), 255, "({x}, {y})");
        }
        // Outside the disc: distance 5, and the (3, 3) diagonal.
        for (x, y) in [(13, 8), (8, 13), (11, 11), (5, 5)] {
            assert_eq!(at(&out, x, y), 0, "({x}, {y})");
        }
    }

    #[test]
    fn test_closing_fills_hole_and_keeps_dot() {
        let rig = gpu_rig!();
        let filled = rig.apply(FilterKind::MorphologyClosing, &dot(255, 0));
        assert!(filled.pixels().all(|p| p[0] == 255));

        let kept = rig.apply(FilterKind::MorphologyClosing, &dot(0, 255));
        assert_eq!(at(&kept, 8, 8), 255);
        assert_eq!(at(&kept, 9, 8), 0);
        assert_eq!(at(&kept, 8, 10), 0);
    }

    #[test]
    fn test_histogram_equalization_spreads_two_levels() {
        let rig = gpu_rig!();
        // A quarter of the pixels at 50, the rest at 200.
        let out = rig.apply(FilterKind::HistogramEqualization, &step(4, 50, 200));
        let low = at(&out, 0, 0);
        assert!((63..=64).contains(&low), "low {low}");
        assert_eq!(at(&out, 15, 15), 255);
        assert_eq!(out.get_pixel(0, 0)[3], 255);
    }

    #[test]
    fn test_histogram_specification_follows_gaussian_target() {
        let rig = gpu_rig!();
        let out = rig.apply(FilterKind::HistogramSpecification, &step(4, 50, 200));
        // The 25th percentile of N(0.5, 0.18) is about 0.379, i.e. level 97.
        let low = at(&out, 0, 0);
        assert!((92..=100).contains(&low), "low {low}");
        assert!(at(&out, 15, 15) >= 250);
    }
}
