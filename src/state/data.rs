//! Shared data structures for the sync pipeline
//!
//! These structs represent the data model that flows between the catalog
//! source, the record store and the archive manifest.

use serde::{Deserialize, Serialize};

/// Blob prefix under which every processed sprite is stored
pub const STORAGE_PREFIX: &str = "larolds";

/// An image attached to a catalog row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    /// Stable identifier of the attachment itself (not of the row)
    pub asset_id: String,
    /// Where the original image can be downloaded from
    pub url: String,
    /// Filename reported by the source, used as a format hint
    pub filename: String,
}

/// One catalog entry as read from the source
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRow {
    pub display_name: String,
    pub attribution: String,
    pub submitter: String,
    /// First attached image, if the row has one
    pub image: Option<ImageAttachment>,
    /// Opaque modification token, only ever compared for equality
    pub last_modified: String,
    /// Whether the row has been confirmed for use
    pub confirmed: bool,
}

/// A synchronized sprite and its metadata
///
/// This is both the record persisted in the store and the entry emitted
/// in the archive manifest.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedAsset {
    /// Primary key, equal to the attachment's asset id
    pub asset_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attribution: String,
    #[serde(default)]
    pub submitter: String,
    pub image_url: String,
    pub last_modified: String,
    /// 1-based position within the pass that produced this value
    pub ordinal_index: u32,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub storage_path: String,
}

impl ProcessedAsset {
    /// Convert to JSON string for the record store
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parse from JSON string (from the record store)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Whether the stored copy is stale relative to a source token
    pub fn is_stale(&self, last_modified: &str) -> bool {
        self.last_modified != last_modified
    }
}

/// Blob path for an asset's processed raster
pub fn storage_path(asset_id: &str) -> String {
    format!("{}/{}.png", STORAGE_PREFIX, asset_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ProcessedAsset {
        ProcessedAsset {
            asset_id: "attA".to_string(),
            name: "Larold".to_string(),
            attribution: "someone".to_string(),
            submitter: "someone else".to_string(),
            image_url: "https://example.com/a.png".to_string(),
            last_modified: "t1".to_string(),
            ordinal_index: 1,
            warnings: vec![],
            storage_path: storage_path("attA"),
        }
    }

    #[test]
    fn test_storage_path_depends_only_on_id() {
        assert_eq!(storage_path("attA"), "larolds/attA.png");
        assert_eq!(storage_path("attA"), storage_path("attA"));
    }

    #[test]
    fn test_manifest_field_names() {
        let json = sample().to_json().unwrap();
        for key in [
            "\"assetId\"",
            "\"imageUrl\"",
            "\"lastModified\"",
            "\"ordinalIndex\"",
            "\"storagePath\"",
        ] {
            assert!(json.contains(key), "missing {key} in {json}");
        }
    }

    #[test]
    fn test_missing_text_fields_default_to_empty() {
        let json = r#"{
            "assetId": "attB",
            "imageUrl": "https://example.com/b.png",
            "lastModified": "t2",
            "ordinalIndex": 2,
            "storagePath": "larolds/attB.png"
        }"#;

        let asset = ProcessedAsset::from_json(json).unwrap();
        assert_eq!(asset.name, "");
        assert_eq!(asset.attribution, "");
        assert_eq!(asset.submitter, "");
        assert!(asset.warnings.is_empty());
    }

    #[test]
    fn test_staleness_compares_tokens() {
        let asset = sample();
        assert!(!asset.is_stale("t1"));
        assert!(asset.is_stale("t2"));
    }
}
