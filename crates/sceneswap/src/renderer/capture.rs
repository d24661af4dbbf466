//! Readback of rendered frames for export.

use crate::error::{AssetError, RenderError, Result};
use image::RgbaImage;
use rayon::prelude::*;
use std::path::Path;

/// A rendered frame copied back to the CPU.
#[derive(Clone, Debug)]
pub struct FrameCapture {
    /// Tracking timestamp of the frame the image came from.
    pub timestamp: f64,
    pub image: RgbaImage,
}

impl FrameCapture {
    /// Encodes the capture as PNG.
    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), AssetError> {
        let path = path.as_ref();
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|source| AssetError::Image {
                name: path.display().to_string(),
                source,
            })
    }
}

/// Bytes per row of a readback buffer, padded to the copy alignment.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// Copies an `Rgba8Unorm` texture into an image. Blocks until the GPU is done.
pub fn read_rgba_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> Result<RgbaImage> {
    let (width, height) = (texture.width(), texture.height());
    let padded = padded_bytes_per_row(width);

    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Capture Readback"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Capture Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::ImageCopyBuffer {
            buffer: &buffer,
            layout: wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| RenderError::Readback("map callback never ran".into()))?
        .map_err(|e| RenderError::Readback(e.to_string()))?;

    let row = (width * 4) as usize;
    let mut pixels = vec![0u8; row * height as usize];
    {
        let mapped = slice.get_mapped_range();
        pixels
            .par_chunks_exact_mut(row)
            .zip(mapped.par_chunks_exact(padded as usize))
            .for_each(|(dst, src)| dst.copy_from_slice(&src[..row]));
    }
    buffer.unmap();

    RgbaImage::from_raw(width, height, pixels)
        .ok_or_else(|| RenderError::Readback("pixel buffer size mismatch".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(720) % wgpu::COPY_BYTES_PER_ROW_ALIGNMENT, 0);
    }
}
