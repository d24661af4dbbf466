//! Named image and mesh assets.

pub mod obj;
pub mod store;

pub use obj::{parse_obj, MeshData, Submesh};
pub use store::{AssetStore, DirAssetStore, InMemoryAssetStore, IMAGE_EXTENSIONS, MESH_EXTENSIONS};

use image::RgbaImage;

/// Where a backdrop image comes from.
#[derive(Clone, Debug)]
pub enum BackdropSource {
    /// Resolved through the [`AssetStore`].
    Named(String),
    /// Decoded pixels supplied by the host, e.g. a picked photo.
    Raw(RgbaImage),
}

impl BackdropSource {
    pub fn named(name: impl Into<String>) -> Self {
        BackdropSource::Named(name.into())
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            BackdropSource::Named(name) => name.clone(),
            BackdropSource::Raw(img) => format!("raw {}x{}", img.width(), img.height()),
        }
    }
}
