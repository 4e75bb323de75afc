//! Per-record content download
//!
//! Fetches the raw bytes behind a record's url. A failed fetch is a
//! per-item condition carrying the record's url for diagnostics; it never
//! aborts sibling downloads.

use crate::{validate_url, CensusError, Record};
use async_trait::async_trait;

/// Retrieves the raw bytes for one record.
///
/// Implementations must be safe to invoke concurrently for different
/// records: no retries, no shared mutable state.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch_bytes(&self, record: &Record) -> Result<Vec<u8>, CensusError>;
}

/// HTTP-backed content fetcher.
///
/// The underlying `reqwest::Client` pools connections internally and is
/// shared across concurrent fetches without any locking here.
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpContentFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn fetch_bytes(&self, record: &Record) -> Result<Vec<u8>, CensusError> {
        if let Err(e) = validate_url(&record.url) {
            return Err(CensusError::ContentFetchFailed {
                url: record.url.clone(),
                reason: format!("invalid url: {e}"),
            });
        }

        let response = self.client.get(&record.url).send().await.map_err(|e| {
            CensusError::ContentFetchFailed {
                url: record.url.clone(),
                reason: e.to_string(),
            }
        })?;

        if response.status() != reqwest::StatusCode::OK {
            return Err(CensusError::ContentFetchFailed {
                url: record.url.clone(),
                reason: format!("HTTP {}", response.status()),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CensusError::ContentFetchFailed {
                url: record.url.clone(),
                reason: e.to_string(),
            })?;

        Ok(bytes.to_vec())
    }
}
