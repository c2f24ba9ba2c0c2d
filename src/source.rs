//! Catalog source
//!
//! Lists the current rows of the Larold catalog. The production source is an
//! Airtable table read through its REST API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Result, SyncError};
use crate::state::data::{ImageAttachment, SourceRow};

/// Lists the current catalog rows in source order.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn list_rows(&self) -> Result<Vec<SourceRow>>;
}

/// Connection settings for an Airtable table
#[derive(Debug, Clone)]
pub struct AirtableSettings {
    pub endpoint: String,
    pub api_key: String,
    pub base: String,
    pub table: String,
    pub view: String,
}

/// Reads catalog rows from Airtable, following pagination to the end.
pub struct AirtableFetcher {
    client: reqwest::Client,
    settings: AirtableSettings,
}

impl AirtableFetcher {
    pub fn new(client: reqwest::Client, settings: AirtableSettings) -> Self {
        Self { client, settings }
    }

    fn table_url(&self) -> String {
        format!(
            "{}/v0/{}/{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.base,
            self.settings.table
        )
    }

    async fn fetch_page(&self, offset: Option<&str>) -> Result<ListPage> {
        let mut request = self
            .client
            .get(self.table_url())
            .bearer_auth(&self.settings.api_key)
            .query(&[("view", self.settings.view.as_str())]);
        if let Some(offset) = offset {
            request = request.query(&[("offset", offset)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::Fetch(format!("HTTP {} from catalog", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SyncError::Fetch(format!("Failed to read response: {}", e)))?;

        parse_page(&body)
    }
}

#[async_trait]
impl SourceFetcher for AirtableFetcher {
    async fn list_rows(&self) -> Result<Vec<SourceRow>> {
        let mut rows = Vec::new();
        let mut offset: Option<String> = None;

        loop {
            let page = self.fetch_page(offset.as_deref()).await?;
            debug!(count = page.records.len(), "Got catalog page");
            rows.extend(page.records.into_iter().map(into_source_row));

            match page.offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        info!(count = rows.len(), "Got larolds from catalog");
        Ok(rows)
    }
}

/// One page of the Airtable list-records response
#[derive(Debug, Deserialize)]
struct ListPage {
    records: Vec<CatalogRecord>,
    #[serde(default)]
    offset: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    #[serde(default)]
    fields: CatalogFields,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogFields {
    #[serde(rename = "Larold name", default)]
    name: Option<String>,
    #[serde(rename = "Attribution name", default)]
    attribution: Option<String>,
    #[serde(rename = "Submitter", default)]
    submitter: Option<String>,
    #[serde(rename = "Image file", default)]
    image_file: Vec<Attachment>,
    #[serde(rename = "Last modified", default)]
    last_modified: Option<Value>,
    #[serde(rename = "Confirmed for use", default)]
    confirmed: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    id: String,
    url: String,
    #[serde(default)]
    filename: String,
}

fn parse_page(body: &str) -> Result<ListPage> {
    serde_json::from_str(body).map_err(|e| SyncError::Fetch(format!("Invalid catalog page: {}", e)))
}

fn into_source_row(record: CatalogRecord) -> SourceRow {
    let fields = record.fields;

    // Opaque token: strings are used as-is, anything else by its JSON text
    let last_modified = match fields.last_modified {
        Some(Value::String(token)) => token,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    SourceRow {
        display_name: fields.name.unwrap_or_default(),
        attribution: fields.attribution.unwrap_or_default(),
        submitter: fields.submitter.unwrap_or_default(),
        image: fields
            .image_file
            .into_iter()
            .next()
            .map(|attachment| ImageAttachment {
                asset_id: attachment.id,
                url: attachment.url,
                filename: attachment.filename,
            }),
        last_modified,
        confirmed: fields.confirmed.as_deref() == Some("Yes"),
    }
}
