//! Request-style entry point for a sync pass
//!
//! Maps the outcome of `SyncOrchestrator::sync` onto a response: the archive
//! as a zip download on success, or a fixed message on failure.

use tracing::error;

use crate::sync::SyncOrchestrator;

/// Suggested download name for the archive
pub const ARCHIVE_FILENAME: &str = "larolds.zip";

/// Body returned when a pass fails
pub const FAILURE_MESSAGE: &str = "Sync failed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub content_disposition: Option<String>,
    pub body: Vec<u8>,
}

impl SyncResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Run one pass and turn the result into a response.
///
/// No partial data is ever returned: a failed pass yields only the fixed
/// failure message, even if some store writes were already committed.
pub async fn handle_sync_request(orchestrator: &SyncOrchestrator) -> SyncResponse {
    match orchestrator.sync().await {
        Ok(archive) => SyncResponse {
            status: 200,
            content_type: "application/zip",
            content_disposition: Some(format!("attachment; filename={}", ARCHIVE_FILENAME)),
            body: archive,
        },
        Err(err) => {
            error!(error = %err, "Sync failed");
            SyncResponse {
                status: 500,
                content_type: "text/plain",
                content_disposition: None,
                body: FAILURE_MESSAGE.as_bytes().to_vec(),
            }
        }
    }
}
