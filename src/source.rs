//! Where referenced assets live and how their bytes are read.
//!
//! Levels name their trile set, art objects, plane textures and character animations; the
//! files sit in sibling folders of the level folder. [`AssetSource`] owns that convention and
//! the raw reads so decoders can be driven from memory in tests.

use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{DecodeError, DecodeResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    TrileSet,
    ArtObject,
    BackgroundPlane,
    CharacterAnimation,
    /// A texture next to the file that references it.
    Texture,
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AssetKind::TrileSet => "trile set",
            AssetKind::ArtObject => "art object",
            AssetKind::BackgroundPlane => "background plane",
            AssetKind::CharacterAnimation => "character animation",
            AssetKind::Texture => "texture",
        };
        f.write_str(label)
    }
}

/// Names of the sibling folders next to the level folder.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FolderLayout {
    #[serde(default = "FolderLayout::default_trile_sets")]
    pub trile_sets: String,
    #[serde(default = "FolderLayout::default_art_objects")]
    pub art_objects: String,
    #[serde(default = "FolderLayout::default_background_planes")]
    pub background_planes: String,
    #[serde(default = "FolderLayout::default_character_animations")]
    pub character_animations: String,
}

impl Default for FolderLayout {
    fn default() -> Self {
        Self {
            trile_sets: Self::default_trile_sets(),
            art_objects: Self::default_art_objects(),
            background_planes: Self::default_background_planes(),
            character_animations: Self::default_character_animations(),
        }
    }
}

impl FolderLayout {
    fn default_trile_sets() -> String {
        "trile sets".to_string()
    }

    fn default_art_objects() -> String {
        "art objects".to_string()
    }

    fn default_background_planes() -> String {
        "background planes".to_string()
    }

    fn default_character_animations() -> String {
        "character animations".to_string()
    }

    fn folder(&self, kind: AssetKind) -> Option<&str> {
        match kind {
            AssetKind::TrileSet => Some(&self.trile_sets),
            AssetKind::ArtObject => Some(&self.art_objects),
            AssetKind::BackgroundPlane => Some(&self.background_planes),
            AssetKind::CharacterAnimation => Some(&self.character_animations),
            AssetKind::Texture => None,
        }
    }

    /// Path of `name` for `kind`, relative to the folder holding the referencing file.
    ///
    /// Trile sets and art objects get an `.xml` suffix. Texture kinds return the image base
    /// path, the texture decoder picks the extension.
    pub fn resolve(&self, kind: AssetKind, referrer_dir: &Path, name: &str) -> PathBuf {
        let file = match kind {
            AssetKind::TrileSet | AssetKind::ArtObject => format!("{name}.xml"),
            _ => name.to_string(),
        };
        normalize_path(&self.folder_path(kind, referrer_dir).join(file))
    }

    /// Folder holding assets of `kind` for files in `referrer_dir`.
    pub fn folder_path(&self, kind: AssetKind, referrer_dir: &Path) -> PathBuf {
        let path = match self.folder(kind) {
            Some(folder) => referrer_dir.join("..").join(folder),
            None => referrer_dir.to_path_buf(),
        };
        normalize_path(&path)
    }
}

/// Folds `.` and `..` components lexically.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    parts.iter().collect()
}

/// Key under which a resolved asset is cached: the normalized path as text.
pub fn cache_key(path: &Path) -> String {
    normalize_path(path).to_string_lossy().into_owned()
}

/// File name up to its first `.`, so `tree.ani.xml` gives `tree`.
pub fn base_name(path: &Path) -> String {
    let leaf = path.file_name().map(|leaf| leaf.to_string_lossy()).unwrap_or_default();
    leaf.split('.').next().unwrap_or_default().to_string()
}

/// Reads a referenced XML asset, reporting a missing file as a reference failure.
pub fn read_asset(source: &dyn AssetSource, kind: AssetKind, path: &Path) -> DecodeResult<String> {
    if !source.exists(path) {
        return Err(DecodeError::MissingAsset { kind, name: base_name(path), path: path.to_path_buf() });
    }
    source.read_text(path)
}

/// Reference resolution and raw reads used by the decoders.
pub trait AssetSource: Send + Sync {
    fn layout(&self) -> &FolderLayout;

    fn resolve(&self, kind: AssetKind, referrer_dir: &Path, name: &str) -> PathBuf {
        self.layout().resolve(kind, referrer_dir, name)
    }

    fn folder(&self, kind: AssetKind, referrer_dir: &Path) -> PathBuf {
        self.layout().folder_path(kind, referrer_dir)
    }

    fn exists(&self, path: &Path) -> bool;

    fn read_text(&self, path: &Path) -> DecodeResult<String>;

    /// Pixel size read from the image header.
    fn image_dimensions(&self, path: &Path) -> DecodeResult<(u32, u32)>;
}

#[derive(Debug, Clone, Default)]
pub struct FsAssetSource {
    layout: FolderLayout,
}

impl FsAssetSource {
    pub fn new(layout: FolderLayout) -> Self {
        Self { layout }
    }
}

impl AssetSource for FsAssetSource {
    fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn read_text(&self, path: &Path) -> DecodeResult<String> {
        fs::read_to_string(path).map_err(|err| DecodeError::io(path, err))
    }

    fn image_dimensions(&self, path: &Path) -> DecodeResult<(u32, u32)> {
        image::image_dimensions(path).map_err(|source| DecodeError::Image { path: path.to_path_buf(), source })
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    Text(String),
    Image { width: u32, height: u32 },
}

/// In-memory asset tree keyed by normalized path. Counts reads per path.
#[derive(Debug, Default)]
pub struct MemoryAssetSource {
    layout: FolderLayout,
    entries: HashMap<PathBuf, MemoryEntry>,
    reads: Mutex<HashMap<PathBuf, usize>>,
}

impl MemoryAssetSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layout(layout: FolderLayout) -> Self {
        Self { layout, ..Self::default() }
    }

    pub fn insert_text(&mut self, path: impl AsRef<Path>, text: impl Into<String>) -> &mut Self {
        self.entries.insert(normalize_path(path.as_ref()), MemoryEntry::Text(text.into()));
        self
    }

    pub fn insert_image(&mut self, path: impl AsRef<Path>, width: u32, height: u32) -> &mut Self {
        self.entries.insert(normalize_path(path.as_ref()), MemoryEntry::Image { width, height });
        self
    }

    /// Number of times `path` was read as text or probed as an image.
    pub fn read_count(&self, path: impl AsRef<Path>) -> usize {
        self.reads.lock().get(&normalize_path(path.as_ref())).copied().unwrap_or(0)
    }

    fn lookup(&self, path: &Path) -> DecodeResult<&MemoryEntry> {
        let key = normalize_path(path);
        *self.reads.lock().entry(key.clone()).or_insert(0) += 1;
        self.entries.get(&key).ok_or_else(|| {
            DecodeError::io(path, std::io::Error::new(std::io::ErrorKind::NotFound, "not in memory source"))
        })
    }
}

impl AssetSource for MemoryAssetSource {
    fn layout(&self) -> &FolderLayout {
        &self.layout
    }

    fn exists(&self, path: &Path) -> bool {
        self.entries.contains_key(&normalize_path(path))
    }

    fn read_text(&self, path: &Path) -> DecodeResult<String> {
        match self.lookup(path)? {
            MemoryEntry::Text(text) => Ok(text.clone()),
            MemoryEntry::Image { .. } => Err(DecodeError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "entry is an image"),
            )),
        }
    }

    fn image_dimensions(&self, path: &Path) -> DecodeResult<(u32, u32)> {
        match self.lookup(path)? {
            MemoryEntry::Image { width, height } => Ok((*width, *height)),
            MemoryEntry::Text(_) => Err(DecodeError::io(
                path,
                std::io::Error::new(std::io::ErrorKind::InvalidData, "entry is not an image"),
            )),
        }
    }
}
