//! Renderer core for an AR camera-effects compositor.
//!
//! Each frame the [`renderer::Compositor`] pulls the latest tracked camera
//! frame, writes the per-frame uniforms into a triple-buffered ring, uploads
//! the captured luma/chroma/depth planes, draws the anchor geometry and the
//! depth-composited camera plane, runs one filter from the
//! [`filters::FilterBank`] and presents the result.

pub mod assets;
pub mod camera;
pub mod controls;
pub mod cutoff;
pub mod error;
pub mod filters;
pub mod renderer;
pub mod tracking;
pub mod uniforms;

pub use assets::{AssetStore, BackdropSource, DirAssetStore, InMemoryAssetStore, MeshData};
pub use camera::{CameraState, Intrinsics, Orientation};
pub use controls::RenderControls;
pub use error::{AssetError, RenderError};
pub use filters::FilterKind;
pub use renderer::{
    context::GfxContext, Compositor, FrameOutcome, FrameOverlay, LightingMode, RendererConfig,
};
pub use tracking::{Anchor, LatestFrame, TrackedFrame, TrackingSource};
