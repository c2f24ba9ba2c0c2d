//! Error types for the sync pipeline.
//!
//! Every fatal condition in a pass maps to one `SyncError` variant. Warnings
//! (such as a color-count mismatch) are not errors; they are recorded on the
//! asset and never abort anything.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Error, Debug)]
pub enum SyncError {
    /// The source catalog could not be listed or returned an invalid payload
    #[error("failed to fetch catalog rows: {0}")]
    Fetch(String),

    /// A source image URL could not be downloaded
    #[error("failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    /// Decoding, remapping, encoding or palette creation failed
    #[error("image conversion failed: {0}")]
    Conversion(String),

    /// A blob upload or download failed
    #[error("blob storage failed for {path}: {reason}")]
    Storage { path: String, reason: String },

    /// A record store read or write failed
    #[error("record store failed: {0}")]
    Persistence(String),

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("failed to encode manifest: {0}")]
    Manifest(serde_json::Error),

    #[error("scratch i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<rusqlite::Error> for SyncError {
    fn from(err: rusqlite::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

impl From<image::ImageError> for SyncError {
    fn from(err: image::ImageError) -> Self {
        SyncError::Conversion(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_the_failure() {
        let err = SyncError::Download {
            url: "https://example.com/a.png".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to download https://example.com/a.png: HTTP 404"
        );
    }

    #[test]
    fn test_manifest_error_display() {
        let cause = serde_json::from_str::<u32>("x").unwrap_err();
        let err = SyncError::Manifest(cause);
        assert!(err.to_string().starts_with("failed to encode manifest: "));
    }

    #[test]
    fn test_sqlite_errors_are_persistence_errors() {
        let err: SyncError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, SyncError::Persistence(_)));
    }
}
