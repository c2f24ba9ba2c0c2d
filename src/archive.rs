//! Downloadable bundle of a sync pass

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::{Result, SyncError};
use crate::state::data::ProcessedAsset;

/// Name of the manifest entry
pub const MANIFEST_NAME: &str = "larolds.json";

/// Name of the composite entry for a given asset count
pub fn strip_name(count: usize) -> String {
    format!("larolds_strip{}.png", count)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ArchivePackager;

impl ArchivePackager {
    /// Zip the manifest and, for a non-empty asset list, the composite strip.
    pub fn package(&self, assets: &[ProcessedAsset], composite: Option<&[u8]>) -> Result<Vec<u8>> {
        let manifest = serde_json::to_string_pretty(assets).map_err(SyncError::Manifest)?;

        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));

        zip.start_file(MANIFEST_NAME, options.clone())?;
        zip.write_all(manifest.as_bytes())?;

        if let Some(strip) = composite.filter(|_| !assets.is_empty()) {
            zip.start_file(strip_name(assets.len()), options)?;
            zip.write_all(strip)?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::storage_path;
    use std::io::Read;
    use zip::ZipArchive;

    fn asset(id: &str, ordinal: u32) -> ProcessedAsset {
        ProcessedAsset {
            asset_id: id.to_string(),
            name: format!("Larold {}", ordinal),
            attribution: String::new(),
            submitter: String::new(),
            image_url: String::new(),
            last_modified: "t".to_string(),
            ordinal_index: ordinal,
            warnings: vec![],
            storage_path: storage_path(id),
        }
    }

    fn entries(bytes: Vec<u8>) -> Vec<String> {
        let archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn test_manifest_and_strip() {
        let assets = vec![asset("attA", 1), asset("attB", 2)];
        let bytes = ArchivePackager.package(&assets, Some(b"png")).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(bytes.clone())).unwrap();
        let mut manifest = String::new();
        archive
            .by_name(MANIFEST_NAME)
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        let parsed: Vec<ProcessedAsset> = serde_json::from_str(&manifest).unwrap();
        assert_eq!(parsed, assets);
        // Pretty-printed
        assert!(manifest.contains("\n  {"));

        assert_eq!(entries(bytes), vec!["larolds.json", "larolds_strip2.png"]);
    }

    #[test]
    fn test_empty_list_has_manifest_only() {
        let bytes = ArchivePackager.package(&[], Some(b"ignored")).unwrap();
        assert_eq!(entries(bytes), vec!["larolds.json"]);
    }

    #[test]
    fn test_missing_composite_has_manifest_only() {
        let bytes = ArchivePackager.package(&[asset("attA", 1)], None).unwrap();
        assert_eq!(entries(bytes), vec!["larolds.json"]);
    }

    #[test]
    fn test_strip_name_embeds_count() {
        assert_eq!(strip_name(5), "larolds_strip5.png");
        assert_ne!(strip_name(5), strip_name(6));
    }
}
