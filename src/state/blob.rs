//! Blob archive for processed sprites

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Durable blob storage addressed by slash-separated paths
/// (e.g. `larolds/{assetId}.png`).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload the file at `local` to `dest`, overwriting any previous blob
    async fn upload(&self, local: &Path, dest: &str) -> Result<()>;

    /// Download the blob at `dest` into the file at `local`
    async fn download(&self, dest: &str, local: &Path) -> Result<()>;
}

/// Blob store backed by a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map a blob path onto the root directory, refusing anything that
    /// could escape it.
    fn resolve(&self, dest: &str) -> Result<PathBuf> {
        let relative = Path::new(dest);
        let is_plain = !dest.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));

        if !is_plain {
            return Err(SyncError::Storage {
                path: dest.to_string(),
                reason: "blob paths must be relative and may not contain '..'".to_string(),
            });
        }

        Ok(self.root.join(relative))
    }
}

fn storage_error(path: &str, err: std::io::Error) -> SyncError {
    SyncError::Storage {
        path: path.to_string(),
        reason: err.to_string(),
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(&self, local: &Path, dest: &str) -> Result<()> {
        let target = self.resolve(dest)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error(dest, e))?;
        }

        fs::copy(local, &target)
            .await
            .map_err(|e| storage_error(dest, e))?;

        debug!(dest, "Uploaded blob");
        Ok(())
    }

    async fn download(&self, dest: &str, local: &Path) -> Result<()> {
        let source = self.resolve(dest)?;
        fs::copy(&source, local)
            .await
            .map_err(|e| storage_error(dest, e))?;

        debug!(dest, local = %local.display(), "Downloaded blob");
        Ok(())
    }
}
