//! Catalog records and metadata retrieval
//!
//! One call against the metadata endpoint yields the full record set for a
//! date range. Any failure on that call decodes to an empty set: callers
//! treat "no data" as the single batch-level failure and never see a
//! metadata error value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One catalog entry describing a remote media item for a given date.
///
/// Built only from a metadata response and never mutated afterwards. Only
/// records whose kind is `"image"` are fetched and decoded; every other
/// kind is preserved and reported as skipped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Record {
    #[serde(default)]
    pub url: String,

    /// Media kind as reported by the endpoint (`media_type` or `type`).
    #[serde(default, rename = "media_type", alias = "type")]
    pub kind: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub date: String,
}

impl Record {
    pub fn is_image(&self) -> bool {
        self.kind == "image"
    }
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {}", self.title, self.url)
    }
}

/// Compose the endpoint URL for a date range.
///
/// The base URL already carries its own query parameters; the range is
/// appended as `&start_date=..&end_date=..`.
pub fn compose_endpoint_url(base: &str, start_date: &str, end_date: &str) -> String {
    format!("{base}&start_date={start_date}&end_date={end_date}")
}

/// Retrieves the full record set behind an endpoint URL.
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Single attempt, no retries. Any transport error, non-200 status, or
    /// unparseable body yields an empty vector.
    async fn fetch(&self, endpoint_url: &str) -> Vec<Record>;
}

/// HTTP-backed metadata fetcher.
pub struct HttpMetadataClient {
    client: reqwest::Client,
}

impl HttpMetadataClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpMetadataClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataClient {
    async fn fetch(&self, endpoint_url: &str) -> Vec<Record> {
        let response = match self.client.get(endpoint_url).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Metadata request failed: {e}");
                return Vec::new();
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            warn!("Metadata endpoint returned {}", response.status());
            return Vec::new();
        }

        match response.text().await {
            Ok(body) => decode_records(&body),
            Err(e) => {
                warn!("Failed to read metadata body: {e}");
                Vec::new()
            }
        }
    }
}

/// Decode a metadata response body into records.
///
/// Missing fields default to empty strings rather than failing the decode;
/// a body that is not a JSON array of objects decodes to no records.
pub fn decode_records(body: &str) -> Vec<Record> {
    match serde_json::from_str::<Vec<Record>>(body) {
        Ok(records) => records,
        Err(e) => {
            warn!("Unparseable metadata body: {e}");
            Vec::new()
        }
    }
}
