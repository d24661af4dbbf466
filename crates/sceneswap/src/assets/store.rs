use super::obj::{parse_obj, MeshData};
use crate::error::AssetError;
use image::RgbaImage;
use parking_lot::RwLock;
use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// Extensions tried, in order, when resolving an image name.
pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
/// Extensions tried when resolving a mesh name.
pub const MESH_EXTENSIONS: &[&str] = &["obj"];

/// Named image and mesh resources.
pub trait AssetStore: Send + Sync {
    fn load_image(&self, name: &str) -> Result<RgbaImage, AssetError>;
    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError>;
}

/// Assets found by walking a directory tree once at construction.
///
/// Names resolve by file stem: an exact `stem.ext` match for the first
/// extension that exists, otherwise the lexicographically first file whose
/// stem starts with the name. Names given with an extension are looked up
/// as-is.
#[derive(Debug)]
pub struct DirAssetStore {
    root: PathBuf,
    /// Keyed by file name, e.g. `Ballroom.png`.
    files: BTreeMap<String, PathBuf>,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, AssetError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(AssetError::Io {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
                path: root,
            });
        }

        let mut files = BTreeMap::new();
        for entry in WalkDir::new(&root)
            .follow_links(true)
            .into_iter()
            .filter_map(Result::ok)
        {
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
                continue;
            };
            // First one wins when the same file name appears in several folders.
            files.entry(name).or_insert_with(|| entry.into_path());
        }

        log::info!("Indexed {} asset files under {}", files.len(), root.display());
        Ok(Self { root, files })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// File stems of every indexed asset with one of `extensions`, sorted.
    pub fn names(&self, extensions: &[&str]) -> Vec<String> {
        let mut names: Vec<String> = self
            .files
            .keys()
            .filter_map(|file| {
                let path = Path::new(file);
                let ext = path.extension()?.to_str()?;
                if extensions.iter().any(|x| ext.eq_ignore_ascii_case(x)) {
                    path.file_stem()?.to_str().map(str::to_owned)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Locates `name` using the given extension preference list.
    pub fn resolve(&self, name: &str, extensions: &'static [&'static str]) -> Result<&Path, AssetError> {
        let has_ext = |file: &str| {
            Path::new(file)
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
                .unwrap_or(false)
        };

        // 1. Given with an extension.
        if has_ext(name) {
            if let Some(path) = self.files.get(name) {
                return Ok(path.as_path());
            }
        }

        // 2. Exact stem, in extension preference order.
        for ext in extensions {
            if let Some(path) = self.files.get(&format!("{name}.{ext}")) {
                return Ok(path.as_path());
            }
        }

        // 3. Prefix match on the stem.
        for (file, path) in self.files.range(name.to_owned()..) {
            if !file.starts_with(name) {
                break;
            }
            if has_ext(file) {
                return Ok(path.as_path());
            }
        }

        Err(AssetError::NotFound {
            name: name.to_owned(),
            extensions,
        })
    }
}

impl AssetStore for DirAssetStore {
    fn load_image(&self, name: &str) -> Result<RgbaImage, AssetError> {
        let path = self.resolve(name, IMAGE_EXTENSIONS)?;
        log::debug!("Loading image '{}' from {}", name, path.display());
        let img = image::open(path).map_err(|source| AssetError::Image {
            name: name.to_owned(),
            source,
        })?;
        let rgba = img.to_rgba8();
        if rgba.width() == 0 || rgba.height() == 0 {
            return Err(AssetError::EmptyImage(name.to_owned()));
        }
        Ok(rgba)
    }

    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        let path = self.resolve(name, MESH_EXTENSIONS)?;
        log::debug!("Loading mesh '{}' from {}", name, path.display());
        let source = std::fs::read_to_string(path).map_err(|source| AssetError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_obj(name, &source)
    }
}

/// Assets registered programmatically, e.g. images picked at runtime.
#[derive(Debug, Default)]
pub struct InMemoryAssetStore {
    images: RwLock<HashMap<String, RgbaImage>>,
    meshes: RwLock<HashMap<String, MeshData>>,
}

impl InMemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_image(&self, name: impl Into<String>, image: RgbaImage) {
        self.images.write().insert(name.into(), image);
    }

    pub fn insert_mesh(&self, name: impl Into<String>, mesh: MeshData) {
        self.meshes.write().insert(name.into(), mesh);
    }
}

impl AssetStore for InMemoryAssetStore {
    fn load_image(&self, name: &str) -> Result<RgbaImage, AssetError> {
        self.images
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                name: name.to_owned(),
                extensions: IMAGE_EXTENSIONS,
            })
    }

    fn load_mesh(&self, name: &str) -> Result<MeshData, AssetError> {
        self.meshes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| AssetError::NotFound {
                name: name.to_owned(),
                extensions: MESH_EXTENSIONS,
            })
    }
}
