//! Pass-scoped scratch area
//!
//! Every file a sync pass writes locally lives under one temporary directory
//! keyed by asset id. The directory is removed when the last handle to it is
//! dropped, including on error exits and when detached tasks finish late.

use std::path::{Component, Path, PathBuf};
use tempfile::TempDir;

use crate::error::{Result, SyncError};

#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create a fresh scratch directory under `root`.
    pub fn create_in(root: &Path) -> Result<Self> {
        std::fs::create_dir_all(root)?;
        let dir = tempfile::Builder::new()
            .prefix("larold-sync-")
            .tempdir_in(root)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the raw download for an asset is written
    pub fn input_path(&self, asset_id: &str, filename_hint: &str) -> Result<PathBuf> {
        let key = scratch_key(asset_id)?;
        Ok(self
            .dir
            .path()
            .join(format!("{}_{}", key, sanitize_hint(filename_hint))))
    }

    /// Where the processed raster for an asset lives during the pass
    pub fn raster_path(&self, asset_id: &str) -> Result<PathBuf> {
        let key = scratch_key(asset_id)?;
        Ok(self.dir.path().join(format!("{}.png", key)))
    }
}

/// Asset ids name files directly, so they must be a single plain component.
fn scratch_key(asset_id: &str) -> Result<&str> {
    let mut components = Path::new(asset_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !asset_id.contains(['/', '\\']) => Ok(asset_id),
        _ => Err(SyncError::Storage {
            path: asset_id.to_string(),
            reason: "asset ids must be a single file name".to_string(),
        }),
    }
}

/// Keep only the final path component of a source filename.
fn sanitize_hint(hint: &str) -> String {
    Path::new(hint)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty() && name != "..")
        .unwrap_or_else(|| "source".to_string())
}
