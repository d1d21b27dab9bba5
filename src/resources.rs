// ABOUTME: Static framework assets for the showtell application
// ABOUTME: Defines the asset store contract, directory/memory/layered stores and the served groups

use crate::errors::{Result, ShowError};
use crate::utils;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// The named asset groups and the dist sub-folder each one is read from.
pub const REVEAL_GROUPS: [(&str, &str); 5] = [
    ("css", "css"),
    ("lib", "lib"),
    ("js", "js"),
    ("plugin", "plugin"),
    ("images", "img"),
];

/// Storage for one group of static files, addressed by relative path.
pub trait AssetStore: Send + Sync {
    /// Relative paths of every stored file, sorted.
    fn list(&self) -> Result<Vec<String>>;

    fn read(&self, path: &str) -> Result<Vec<u8>>;

    fn write(&self, path: &str, data: &[u8]) -> Result<()>;
}

/// Assets kept in a folder on disk.
#[derive(Debug, Clone)]
pub struct DirAssetStore {
    root: PathBuf,
}

impl DirAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AssetStore for DirAssetStore {
    fn list(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        list_files(&self.root)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let relative = utils::sanitize_asset_path(path)?;
        let full_path = self.root.join(relative);
        if !full_path.is_file() {
            return Err(ShowError::AssetNotFound(path.to_string()));
        }
        fs::read(&full_path).map_err(|e| ShowError::io(&full_path, e))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        let relative = utils::sanitize_asset_path(path)?;
        let full_path = self.root.join(relative);
        utils::ensure_parent_directory_exists(&full_path)?;
        fs::write(&full_path, data).map_err(|e| ShowError::io(&full_path, e))
    }
}

/// Assets held in memory.
#[derive(Debug, Default)]
pub struct MemoryAssetStore {
    files: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly useful for tests and embedded assets
    pub fn with_file(self, path: &str, data: impl Into<Vec<u8>>) -> Self {
        self.files.write().insert(path.to_string(), data.into());
        self
    }
}

impl AssetStore for MemoryAssetStore {
    fn list(&self) -> Result<Vec<String>> {
        Ok(self.files.read().keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        utils::sanitize_asset_path(path)?;
        self.files
            .read()
            .get(path)
            .cloned()
            .ok_or_else(|| ShowError::AssetNotFound(path.to_string()))
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        utils::sanitize_asset_path(path)?;
        self.files.write().insert(path.to_string(), data.to_vec());
        Ok(())
    }
}

/// An in-memory overlay on top of another store. Reads prefer the overlay,
/// writes never reach the base store.
pub struct LayeredAssetStore {
    overlay: MemoryAssetStore,
    base: Box<dyn AssetStore>,
}

impl LayeredAssetStore {
    pub fn new(base: impl AssetStore + 'static) -> Self {
        Self {
            overlay: MemoryAssetStore::new(),
            base: Box::new(base),
        }
    }
}

impl AssetStore for LayeredAssetStore {
    fn list(&self) -> Result<Vec<String>> {
        let mut paths = self.base.list()?;
        paths.extend(self.overlay.list()?);
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<Vec<u8>> {
        match self.overlay.read(path) {
            Err(ShowError::AssetNotFound(_)) => self.base.read(path),
            other => other,
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> Result<()> {
        self.overlay.write(path, data)
    }
}

/// A store served under `/<name>/`.
pub struct AssetGroup {
    pub name: String,
    pub store: Box<dyn AssetStore>,
}

impl AssetGroup {
    pub fn new(name: &str, store: impl AssetStore + 'static) -> Self {
        Self {
            name: name.to_string(),
            store: Box::new(store),
        }
    }
}

/// The reveal.js framework files the composed document links to.
#[derive(Default)]
pub struct RevealAssets {
    groups: Vec<AssetGroup>,
}

impl RevealAssets {
    pub fn new(groups: Vec<AssetGroup>) -> Self {
        Self { groups }
    }

    /// No assets at all; every asset request answers 404
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read the standard groups from a reveal.js dist folder. Each group can
    /// later be overridden in memory with [`RevealAssets::add_custom_files`].
    pub fn from_dist_dir(dist_dir: &Path) -> Self {
        info!("Using reveal.js assets from {:?}", dist_dir);
        let groups = REVEAL_GROUPS
            .iter()
            .map(|(name, folder)| {
                let base = DirAssetStore::new(dist_dir.join(folder));
                AssetGroup::new(name, LayeredAssetStore::new(base))
            })
            .collect();
        Self { groups }
    }

    pub fn groups(&self) -> &[AssetGroup] {
        &self.groups
    }

    pub fn group(&self, name: &str) -> Option<&AssetGroup> {
        self.groups.iter().find(|group| group.name == name)
    }

    /// Read `path` from the group called `group`
    pub fn read(&self, group: &str, path: &str) -> Result<Vec<u8>> {
        match self.group(group) {
            Some(found) => found.store.read(path),
            None => Err(ShowError::AssetNotFound(format!("{}/{}", group, path))),
        }
    }

    /// Write every file under `base_dir/<group>/` into the matching group.
    /// Returns how many files were added.
    pub fn add_custom_files(&self, base_dir: &Path) -> Result<usize> {
        if !base_dir.is_dir() {
            return Ok(0);
        }

        let mut added = 0;
        for group in &self.groups {
            let group_dir = base_dir.join(&group.name);
            if !group_dir.is_dir() {
                continue;
            }
            for relative in list_files(&group_dir)? {
                let full_path = group_dir.join(&relative);
                let data = fs::read(&full_path).map_err(|e| ShowError::io(&full_path, e))?;
                info!("Adding custom file {} to {}", relative, group.name);
                group.store.write(&relative, &data)?;
                added += 1;
            }
        }
        Ok(added)
    }

    /// Write every asset to `dest_dir/<group>/<path>`. Returns the file count.
    pub fn emit(&self, dest_dir: &Path) -> Result<usize> {
        let mut written = 0;
        for group in &self.groups {
            let group_dir = dest_dir.join(&group.name);
            utils::ensure_directory_exists(&group_dir)?;
            for relative in group.store.list()? {
                let data = group.store.read(&relative)?;
                let out_path = group_dir.join(utils::sanitize_asset_path(&relative)?);
                utils::ensure_parent_directory_exists(&out_path)?;
                fs::write(&out_path, data).map_err(|e| ShowError::io(&out_path, e))?;
                debug!("Emitted {:?}", out_path);
                written += 1;
            }
        }
        info!("Emitted {} assets to {:?}", written, dest_dir);
        Ok(written)
    }
}

/// Relative, '/'-separated paths of all files below `root`, sorted.
fn list_files(root: &Path) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            ShowError::io(&path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            let parts: Vec<String> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect();
            files.push(parts.join("/"));
        }
    }
    Ok(files)
}
