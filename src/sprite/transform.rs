//! Pixel-art normalization and strip composition over the `image` crate

use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::collections::HashSet;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::{Result, SyncError};

/// Edge length of a processed sprite and of one strip cell
pub const TILE_SIZE: u32 = 200;

/// One processed raster placed in the composite strip
#[derive(Debug, Clone)]
pub struct StripTile {
    /// 1-based ordinal; the tile lands at x = (ordinal - 1) * TILE_SIZE
    pub ordinal: u32,
    pub path: PathBuf,
}

/// Image operations the pipeline relies on.
///
/// All methods are blocking and CPU-bound; callers run them on the blocking
/// pool.
pub trait ImageTransform: Send + Sync {
    /// Number of distinct colors in the image at `input`
    fn count_colors(&self, input: &Path) -> Result<usize>;

    /// Shrink `input` to fit a tile, remap it onto the colors of the palette
    /// image and write the result as PNG to `output`
    fn convert(&self, input: &Path, palette: &Path, output: &Path) -> Result<()>;

    /// Tile the given rasters horizontally and encode the strip as PNG
    fn compose_strip(&self, tiles: &[StripTile]) -> Result<Vec<u8>>;
}

/// Two-tone pixel art transform built on the `image` crate
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelArtTransform;

/// Decode an image, guessing the format from its content rather than the
/// file extension (source filenames are only hints).
fn open_image(path: &Path) -> Result<DynamicImage> {
    let img = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(img)
}

/// Shrink to fit within `max_edge` x `max_edge`, preserving aspect ratio.
/// Images that already fit are returned untouched.
pub fn shrink_to_fit(img: DynamicImage, max_edge: u32) -> DynamicImage {
    if img.width() <= max_edge && img.height() <= max_edge {
        return img;
    }
    img.resize(max_edge, max_edge, FilterType::Lanczos3)
}

/// Remap every pixel to the nearest palette color by RGB distance.
/// Alpha is carried over unchanged.
pub fn remap_to_palette(img: &mut RgbaImage, palette: &[Rgba<u8>]) {
    if palette.is_empty() {
        return;
    }

    for pixel in img.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        let nearest = palette
            .iter()
            .min_by_key(|candidate| {
                let [pr, pg, pb, _] = candidate.0;
                let dr = i32::from(r) - i32::from(pr);
                let dg = i32::from(g) - i32::from(pg);
                let db = i32::from(b) - i32::from(pb);
                dr * dr + dg * dg + db * db
            })
            .copied()
            .unwrap_or(*pixel);
        *pixel = Rgba([nearest[0], nearest[1], nearest[2], a]);
    }
}

/// Distinct colors of a palette image, in first-seen order
fn palette_colors(palette: &RgbaImage) -> Vec<Rgba<u8>> {
    let mut colors: Vec<Rgba<u8>> = Vec::new();
    for pixel in palette.pixels() {
        if !colors.contains(pixel) {
            colors.push(*pixel);
        }
    }
    colors
}

impl ImageTransform for PixelArtTransform {
    fn count_colors(&self, input: &Path) -> Result<usize> {
        let img = open_image(input)?.to_rgba8();
        let colors: HashSet<[u8; 4]> = img.pixels().map(|p| p.0).collect();
        Ok(colors.len())
    }

    fn convert(&self, input: &Path, palette: &Path, output: &Path) -> Result<()> {
        let palette = palette_colors(&open_image(palette)?.to_rgba8());
        if palette.is_empty() {
            return Err(SyncError::Conversion("palette image has no pixels".to_string()));
        }

        let mut sprite = shrink_to_fit(open_image(input)?, TILE_SIZE).to_rgba8();
        remap_to_palette(&mut sprite, &palette);
        sprite.save_with_format(output, ImageFormat::Png)?;
        Ok(())
    }

    fn compose_strip(&self, tiles: &[StripTile]) -> Result<Vec<u8>> {
        if tiles.is_empty() {
            return Err(SyncError::Conversion(
                "cannot compose a strip with no tiles".to_string(),
            ));
        }

        let count = tiles.len() as u32;
        let mut strip = RgbaImage::new(TILE_SIZE * count, TILE_SIZE);

        for tile in tiles {
            if tile.ordinal == 0 || tile.ordinal > count {
                return Err(SyncError::Conversion(format!(
                    "ordinal {} outside 1..={}",
                    tile.ordinal, count
                )));
            }

            let img = open_image(&tile.path)?;
            // Keep oversized inputs inside their own cell
            let cell = img
                .crop_imm(0, 0, img.width().min(TILE_SIZE), img.height().min(TILE_SIZE))
                .to_rgba8();
            let x = i64::from((tile.ordinal - 1) * TILE_SIZE);
            imageops::overlay(&mut strip, &cell, x, 0);
        }

        let mut buffer = Cursor::new(Vec::new());
        strip.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }
}
