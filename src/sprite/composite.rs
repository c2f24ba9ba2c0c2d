//! Composite strip of every sprite in the current pass

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{info, warn};

use super::transform::{ImageTransform, StripTile};
use crate::error::{Result, SyncError};
use crate::scratch::ScratchArea;
use crate::state::blob::BlobStore;
use crate::state::data::ProcessedAsset;

pub struct CompositeBuilder {
    blobs: Arc<dyn BlobStore>,
    transform: Arc<dyn ImageTransform>,
}

impl CompositeBuilder {
    pub fn new(blobs: Arc<dyn BlobStore>, transform: Arc<dyn ImageTransform>) -> Self {
        Self { blobs, transform }
    }

    /// Build the strip PNG for a non-empty list of assets.
    ///
    /// Rasters processed earlier in the pass are already in the scratch area;
    /// the rest are downloaded from the blob store. Local copies are removed
    /// once the strip is encoded.
    pub async fn build(&self, assets: &[ProcessedAsset], scratch: &ScratchArea) -> Result<Vec<u8>> {
        if assets.is_empty() {
            return Err(SyncError::Conversion(
                "composite requested for an empty asset list".to_string(),
            ));
        }

        let tiles = try_join_all(assets.iter().map(|asset| self.ensure_local(asset, scratch))).await?;

        let strip = {
            let transform = Arc::clone(&self.transform);
            let tiles = tiles.clone();
            tokio::task::spawn_blocking(move || transform.compose_strip(&tiles)).await??
        };

        for tile in &tiles {
            if let Err(err) = tokio::fs::remove_file(&tile.path).await {
                warn!(path = %tile.path.display(), error = %err, "Failed to remove local copy");
            }
        }

        info!(count = assets.len(), bytes = strip.len(), "Built composite strip");
        Ok(strip)
    }

    async fn ensure_local(&self, asset: &ProcessedAsset, scratch: &ScratchArea) -> Result<StripTile> {
        let path = scratch.raster_path(&asset.asset_id)?;

        if !tokio::fs::try_exists(&path).await? {
            info!(destination = %asset.storage_path, "Downloading image");
            self.blobs.download(&asset.storage_path, &path).await?;
        }

        Ok(StripTile {
            ordinal: asset.ordinal_index,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::transform::{PixelArtTransform, TILE_SIZE};
    use crate::state::blob::LocalBlobStore;
    use crate::state::data::storage_path;
    use image::{ImageFormat, Rgba, RgbaImage};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);

    fn asset(id: &str, ordinal: u32) -> ProcessedAsset {
        ProcessedAsset {
            asset_id: id.to_string(),
            name: String::new(),
            attribution: String::new(),
            submitter: String::new(),
            image_url: String::new(),
            last_modified: "t1".to_string(),
            ordinal_index: ordinal,
            warnings: vec![],
            storage_path: storage_path(id),
        }
    }

    fn solid(path: &std::path::Path, color: Rgba<u8>) {
        RgbaImage::from_pixel(TILE_SIZE, TILE_SIZE, color)
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    #[tokio::test]
    async fn test_downloads_missing_and_reuses_local() {
        let dir = tempfile::tempdir().unwrap();
        let blob_root = dir.path().join("blobs");
        std::fs::create_dir_all(blob_root.join("larolds")).unwrap();
        let scratch = ScratchArea::create_in(&dir.path().join("scratch")).unwrap();

        // attA only in the blob store, attB already local from this pass
        solid(&blob_root.join("larolds/attA.png"), RED);
        solid(&scratch.raster_path("attB").unwrap(), BLUE);

        let builder = CompositeBuilder::new(
            Arc::new(LocalBlobStore::new(&blob_root)),
            Arc::new(PixelArtTransform),
        );
        let png = builder
            .build(&[asset("attA", 1), asset("attB", 2)], &scratch)
            .await
            .unwrap();

        let strip = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(strip.dimensions(), (2 * TILE_SIZE, TILE_SIZE));
        assert_eq!(*strip.get_pixel(10, 10), RED);
        assert_eq!(*strip.get_pixel(TILE_SIZE + 10, 10), BLUE);

        // Local copies are not kept across passes
        assert!(!scratch.raster_path("attA").unwrap().exists());
        assert!(!scratch.raster_path("attB").unwrap().exists());
    }

    #[tokio::test]
    async fn test_missing_blob_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::create_in(dir.path()).unwrap();
        let builder = CompositeBuilder::new(
            Arc::new(LocalBlobStore::new(dir.path().join("blobs"))),
            Arc::new(PixelArtTransform),
        );

        let err = builder.build(&[asset("attZ", 1)], &scratch).await.unwrap_err();
        assert!(matches!(err, SyncError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_empty_list_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let scratch = ScratchArea::create_in(dir.path()).unwrap();
        let builder = CompositeBuilder::new(
            Arc::new(LocalBlobStore::new(dir.path())),
            Arc::new(PixelArtTransform),
        );

        assert!(builder.build(&[], &scratch).await.is_err());
    }
}
