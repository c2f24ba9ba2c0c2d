//! Reference palette for the two-tone remap
//!
//! The palette is a 2x1 PNG holding the two Larold colors. It is written once
//! per process and reused by every conversion.

use image::{ImageFormat, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{Result, SyncError};

/// Dark tone (#1A1721)
pub const PALETTE_DARK: Rgba<u8> = Rgba([0x1A, 0x17, 0x21, 0xFF]);
/// Light tone (#FFC89C)
pub const PALETTE_LIGHT: Rgba<u8> = Rgba([0xFF, 0xC8, 0x9C, 0xFF]);

/// Writes a palette image to the given path
pub type PaletteWriter = Arc<dyn Fn(&Path) -> Result<()> + Send + Sync>;

/// Outcome of the most recent creation attempt, guarded by the mutex
#[derive(Debug, Default)]
struct CreationState {
    /// Bumped after every failed attempt
    generation: u64,
    failure: Option<String>,
}

/// Lazily materializes the palette image at a fixed path.
///
/// Callers that find the file missing serialize on a mutex and re-check
/// before creating it, so the file is written at most once. Callers that were
/// queued behind a failed attempt receive that failure instead of retrying.
pub struct PaletteProvider {
    path: PathBuf,
    writer: PaletteWriter,
    generation: AtomicU64,
    state: Mutex<CreationState>,
}

impl PaletteProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_writer(path, Arc::new(write_palette))
    }

    /// Use a custom writer in place of the built-in PNG encoder.
    pub fn with_writer(path: impl Into<PathBuf>, writer: PaletteWriter) -> Self {
        Self {
            path: path.into(),
            writer,
            generation: AtomicU64::new(0),
            state: Mutex::new(CreationState::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the palette path, creating the file if it does not exist yet.
    pub async fn ensure_palette(&self) -> Result<PathBuf> {
        if self.exists().await {
            return Ok(self.path.clone());
        }

        let seen = self.generation.load(Ordering::Acquire);
        let mut state = self.state.lock().await;

        // Another caller may have created it while we waited
        if self.exists().await {
            return Ok(self.path.clone());
        }

        if state.generation != seen {
            if let Some(reason) = &state.failure {
                return Err(SyncError::Conversion(reason.clone()));
            }
        }

        match self.create().await {
            Ok(()) => {
                state.failure = None;
                info!(path = %self.path.display(), "Created palette file");
                Ok(self.path.clone())
            }
            Err(err) => {
                let reason = format!("failed to create palette: {}", err);
                state.generation += 1;
                state.failure = Some(reason.clone());
                self.generation.store(state.generation, Ordering::Release);
                Err(SyncError::Conversion(reason))
            }
        }
    }

    async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Write the palette under a temporary name and rename it into place, so
    /// readers never observe a partial file.
    async fn create(&self) -> Result<()> {
        let path = self.path.clone();
        let writer = Arc::clone(&self.writer);
        tokio::task::spawn_blocking(move || writer(&path)).await?
    }
}

impl std::fmt::Debug for PaletteProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaletteProvider")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .finish()
    }
}

fn write_palette(path: &Path) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;

    let palette = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { PALETTE_DARK } else { PALETTE_LIGHT });

    let staging = tempfile::Builder::new()
        .prefix(".palette-")
        .suffix(".png")
        .tempfile_in(parent)?;
    palette.save_with_format(staging.path(), ImageFormat::Png)?;
    staging
        .persist(path)
        .map_err(|e| SyncError::Conversion(e.to_string()))?;
    Ok(())
}
