use std::path::PathBuf;
use thiserror::Error;

/// Failures while locating or decoding named assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset '{name}' not found (looked for extensions {extensions:?})")]
    NotFound {
        name: String,
        extensions: &'static [&'static str],
    },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image '{name}': {source}")]
    Image {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("{name}:{line}: {message}")]
    Obj {
        name: String,
        line: usize,
        message: String,
    },

    #[error("mesh '{0}' contains no triangles")]
    EmptyMesh(String),

    #[error("image '{0}' has zero width or height")]
    EmptyImage(String),

    #[error("image '{name}' is {width}x{height}, larger than the {max}px texture limit")]
    ImageTooLarge {
        name: String,
        width: u32,
        height: u32,
        max: u32,
    },
}

/// Failures surfaced by renderer construction and explicit requests.
///
/// Per-frame problems never show up here; they are reported as
/// [`crate::renderer::FrameOutcome::Skipped`].
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to request GPU device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),

    #[error("failed to create surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),

    #[error("surface reports no supported texture formats")]
    UnsupportedSurface,

    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("frame readback failed: {0}")]
    Readback(String),

    #[error("no frame has been presented yet")]
    NothingPresented,
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
