//! Per-asset image processing
//!
//! Turns one source image into a stored two-tone sprite:
//! download → scratch write → color check → palette → convert → upload.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::palette::PaletteProvider;
use super::transform::ImageTransform;
use crate::error::Result;
use crate::http::HttpClient;
use crate::scratch::ScratchArea;
use crate::state::blob::BlobStore;
use crate::state::data::storage_path;

/// Number of colors a well-formed source sprite has
pub const EXPECTED_COLORS: usize = 2;

/// Result of processing one asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Non-fatal problems found in the source image
    pub warnings: Vec<String>,
    /// Blob path the sprite was uploaded to
    pub storage_path: String,
}

/// Warning for a source image whose palette is not exactly two colors
pub fn color_warning(observed: usize) -> Option<String> {
    (observed != EXPECTED_COLORS).then(|| {
        format!(
            "Incorrect number of colors ({}) expected {}",
            observed, EXPECTED_COLORS
        )
    })
}

pub struct ImageProcessor {
    http: Arc<dyn HttpClient>,
    blobs: Arc<dyn BlobStore>,
    palette: Arc<PaletteProvider>,
    transform: Arc<dyn ImageTransform>,
}

impl ImageProcessor {
    pub fn new(
        http: Arc<dyn HttpClient>,
        blobs: Arc<dyn BlobStore>,
        palette: Arc<PaletteProvider>,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        Self {
            http,
            blobs,
            palette,
            transform,
        }
    }

    /// Download, convert and upload one source image.
    ///
    /// The converted raster is left in the scratch area so the composite can
    /// reuse it without another download.
    pub async fn process(
        &self,
        source_url: &str,
        filename_hint: &str,
        asset_id: &str,
        scratch: &ScratchArea,
    ) -> Result<ProcessOutcome> {
        let input = scratch.input_path(asset_id, filename_hint)?;
        let output = scratch.raster_path(asset_id)?;

        // Step 1: Fetch the original
        let bytes = self.http.get_bytes(source_url).await?;

        // Step 2: Persist to scratch
        tokio::fs::write(&input, &bytes).await?;
        debug!(url = source_url, input = %input.display(), "Got file");

        // Step 3: Count colors (diagnostic only)
        let colors = self.run_blocking({
            let input = input.clone();
            move |transform: &dyn ImageTransform| transform.count_colors(&input)
        })
        .await?;

        // Step 4: Make sure the palette exists
        let palette = self.palette.ensure_palette().await?;

        // Step 5: Shrink and remap
        self.run_blocking({
            let input = input.clone();
            let output = output.clone();
            move |transform: &dyn ImageTransform| transform.convert(&input, &palette, &output)
        })
        .await?;
        debug!(asset_id, output = %output.display(), "Processed image");

        // Step 6: Upload
        let destination = storage_path(asset_id);
        self.blobs.upload(&output, &destination).await?;

        // Step 7: Drop the raw input
        if let Err(err) = tokio::fs::remove_file(&input).await {
            warn!(input = %input.display(), error = %err, "Failed to remove scratch input");
        }

        let warnings: Vec<String> = color_warning(colors).into_iter().collect();
        info!(asset_id, destination = %destination, ?warnings, "Uploaded image");

        Ok(ProcessOutcome {
            warnings,
            storage_path: destination,
        })
    }

    /// Run a transform call on the blocking pool.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ImageTransform) -> Result<T> + Send + 'static,
    {
        let transform = Arc::clone(&self.transform);
        tokio::task::spawn_blocking(move || f(transform.as_ref())).await?
    }
}

impl std::fmt::Debug for ImageProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageProcessor")
            .field("palette", &self.palette.path())
            .finish()
    }
}
