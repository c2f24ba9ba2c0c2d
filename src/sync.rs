//! Sync orchestration
//!
//! One pass runs Fetch → Diff → Transform → Reconcile → Compose → Package:
//! the catalog is fetched and filtered, each retained row is diffed against
//! the record store and reprocessed only when new or modified, stale records
//! are deleted, and the result is bundled with a composite strip.
//!
//! Per-row work fans out into one task per row. The first failure aborts the
//! pass; sibling tasks are left to finish on their own and any records they
//! already wrote stay written.

use futures::future::try_join_all;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::archive::ArchivePackager;
use crate::error::{Result, SyncError};
use crate::http::HttpClient;
use crate::scratch::ScratchArea;
use crate::source::SourceFetcher;
use crate::sprite::composite::CompositeBuilder;
use crate::sprite::palette::PaletteProvider;
use crate::sprite::processor::ImageProcessor;
use crate::sprite::transform::ImageTransform;
use crate::state::blob::BlobStore;
use crate::state::data::{ImageAttachment, ProcessedAsset, SourceRow};
use crate::state::library::RecordStore;

/// External collaborators a sync pass runs against
pub struct Collaborators {
    pub source: Arc<dyn SourceFetcher>,
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub http: Arc<dyn HttpClient>,
    pub transform: Arc<dyn ImageTransform>,
    pub palette: Arc<PaletteProvider>,
}

/// A catalog row that passed the filter, with its position in the pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// 1-based, in fetch order among retained rows
    pub ordinal_index: u32,
    pub row: SourceRow,
    pub image: ImageAttachment,
}

/// Keep confirmed rows with an attached image and number them in order.
pub fn select_candidates(rows: Vec<SourceRow>) -> Vec<Candidate> {
    rows.into_iter()
        .filter(|row| row.confirmed)
        .filter_map(|row| row.image.clone().map(|image| (row, image)))
        .zip(1u32..)
        .map(|((row, image), ordinal_index)| Candidate {
            ordinal_index,
            row,
            image,
        })
        .collect()
}

#[derive(Debug)]
enum RowOutcome {
    Processed(ProcessedAsset),
    Reused(ProcessedAsset),
}

/// Everything one per-row task needs, owned so it can be spawned
struct RowWorker {
    records: Arc<dyn RecordStore>,
    processor: Arc<ImageProcessor>,
    scratch: Arc<ScratchArea>,
}

impl RowWorker {
    async fn sync_row(self, candidate: Candidate) -> Result<RowOutcome> {
        let Candidate {
            ordinal_index,
            row,
            image,
        } = candidate;

        match self.records.get(&image.asset_id).await? {
            Some(mut stored) if !stored.is_stale(&row.last_modified) => {
                debug!(asset_id = %image.asset_id, "Unchanged, reusing stored record");
                // The store keeps its copy; only this pass's view is renumbered
                stored.ordinal_index = ordinal_index;
                Ok(RowOutcome::Reused(stored))
            }
            _ => {
                let outcome = self
                    .processor
                    .process(&image.url, &image.filename, &image.asset_id, &self.scratch)
                    .await?;

                let asset = ProcessedAsset {
                    asset_id: image.asset_id,
                    name: row.display_name,
                    attribution: row.attribution,
                    submitter: row.submitter,
                    image_url: image.url,
                    last_modified: row.last_modified,
                    ordinal_index,
                    warnings: outcome.warnings,
                    storage_path: outcome.storage_path,
                };
                self.records.set(&asset.asset_id, &asset).await?;
                Ok(RowOutcome::Processed(asset))
            }
        }
    }
}

pub struct SyncOrchestrator {
    source: Arc<dyn SourceFetcher>,
    records: Arc<dyn RecordStore>,
    processor: Arc<ImageProcessor>,
    composer: CompositeBuilder,
    packager: ArchivePackager,
    scratch_root: PathBuf,
}

impl SyncOrchestrator {
    pub fn new(collaborators: Collaborators, scratch_root: impl Into<PathBuf>) -> Self {
        let Collaborators {
            source,
            records,
            blobs,
            http,
            transform,
            palette,
        } = collaborators;

        let processor = ImageProcessor::new(http, Arc::clone(&blobs), palette, Arc::clone(&transform));

        Self {
            source,
            records,
            processor: Arc::new(processor),
            composer: CompositeBuilder::new(blobs, transform),
            packager: ArchivePackager,
            scratch_root: scratch_root.into(),
        }
    }

    /// Run one full sync pass and return the archive bytes.
    pub async fn sync(&self) -> Result<Vec<u8>> {
        // Fetch
        let rows = self.source.list_rows().await?;
        let fetched = rows.len();

        // Filter
        let candidates = select_candidates(rows);
        info!(fetched, accepted = candidates.len(), "Filtered catalog rows");

        let scratch = Arc::new(ScratchArea::create_in(&self.scratch_root)?);

        // Diff + transform, one task per row
        let handles: Vec<_> = candidates
            .into_iter()
            .map(|candidate| {
                let worker = RowWorker {
                    records: Arc::clone(&self.records),
                    processor: Arc::clone(&self.processor),
                    scratch: Arc::clone(&scratch),
                };
                tokio::spawn(worker.sync_row(candidate))
            })
            .collect();

        let outcomes = try_join_all(handles.into_iter().map(|handle| async move {
            handle.await.map_err(SyncError::from).and_then(|outcome| outcome)
        }))
        .await?;

        let mut assets = Vec::with_capacity(outcomes.len());
        let mut processed = 0usize;
        for outcome in outcomes {
            match outcome {
                RowOutcome::Processed(asset) => {
                    processed += 1;
                    assets.push(asset);
                }
                RowOutcome::Reused(asset) => assets.push(asset),
            }
        }
        assets.sort_by_key(|asset| asset.ordinal_index);
        let reused = assets.len() - processed;
        info!(processed, reused, "Updated larolds in store");

        // Reconcile
        let deleted = self.reconcile(&assets).await?;

        // Compose
        let composite = if assets.is_empty() {
            None
        } else {
            Some(self.composer.build(&assets, &scratch).await?)
        };

        // Package
        let archive = self.packager.package(&assets, composite.as_deref())?;

        info!(
            total = assets.len(),
            processed,
            reused,
            deleted = deleted.len(),
            bytes = archive.len(),
            "Done sync"
        );
        Ok(archive)
    }

    /// Delete every stored record whose id is not in the accepted set.
    async fn reconcile(&self, assets: &[ProcessedAsset]) -> Result<Vec<String>> {
        let accepted: HashSet<&str> = assets.iter().map(|asset| asset.asset_id.as_str()).collect();

        let stale: Vec<String> = self
            .records
            .list_ids()
            .await?
            .into_iter()
            .filter(|id| !accepted.contains(id.as_str()))
            .collect();

        try_join_all(stale.iter().map(|id| self.records.delete(id))).await?;

        info!(deleted_ids = ?stale, "Removed larolds in store");
        Ok(stale)
    }
}
