//! HTTP client abstraction for image downloads

use async_trait::async_trait;
use std::time::Duration;
use tracing::trace;

use crate::error::{Result, SyncError};

/// Fetches raw bytes over HTTP.
///
/// This abstraction allows injecting a fake client in tests.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Performs a GET request and returns the response body.
    ///
    /// Any transport failure or non-success status is a `SyncError::Download`.
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with the given request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::Fetch(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Access the underlying client, shared with the catalog fetcher.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

fn download_error(url: &str, reason: impl ToString) -> SyncError {
    SyncError::Download {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(url, format!("Request failed: {}", e)))?;

        // Check HTTP status
        let status = response.status();
        if !status.is_success() {
            return Err(download_error(url, format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| download_error(url, format!("Failed to read response: {}", e)))?;

        trace!(url, bytes = body.len(), "Downloaded");
        Ok(body.to_vec())
    }
}
