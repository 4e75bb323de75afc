//! Pipeline orchestration
//!
//! Drives a batch of records through fetch-and-count under a selected
//! concurrency engine. Each record moves through its own state machine,
//! independent of its siblings:
//!
//! ```text
//! PENDING -> (kind != image) -> SKIPPED
//! PENDING -> FETCHING -> FETCH_FAILED
//!                     -> FETCHED -> DECODING -> DECODE_FAILED
//!                                            -> COUNTED
//! ```
//!
//! Engines may finish items in any order; the orchestrator reindexes the
//! completions so the returned results always match the input order.

use crate::{
    count_colors, CensusError, Config, ContentFetcher, Engine, EngineKind, HttpContentFetcher,
    HttpMetadataClient, ItemTask, MetadataFetcher, Record,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Terminal outcome of one record's trip through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub enum ItemOutcome {
    /// The record's image decoded to this many distinct pixel values.
    ColorCount(u64),
    /// The record's kind is not `"image"`; no fetch or decode attempted.
    Skipped,
    /// The content fetch failed; siblings are unaffected.
    FetchFailed { reason: String },
    /// The fetched bytes could not be decoded as an image.
    DecodeFailed { reason: String },
}

/// One input record paired with its terminal outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineResult {
    pub record: Record,
    pub outcome: ItemOutcome,
}

/// The ordered results of a run plus its total elapsed time.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub results: Vec<PipelineResult>,
    pub elapsed: Duration,
}

/// Drives one record to a terminal outcome.
///
/// Engines call this for every task; implementations never return an
/// error, because every failure is itself a terminal outcome.
#[async_trait]
pub trait ItemWorker: Send + Sync {
    async fn process(&self, record: Record) -> ItemOutcome;
}

/// The production worker: skip check, content fetch, color count.
pub struct CensusWorker {
    fetcher: Arc<dyn ContentFetcher>,
}

impl CensusWorker {
    pub fn new(fetcher: Arc<dyn ContentFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl ItemWorker for CensusWorker {
    async fn process(&self, record: Record) -> ItemOutcome {
        if !record.is_image() {
            warn!("Invalid media type {:?} for {record}", record.kind);
            return ItemOutcome::Skipped;
        }

        debug!("Getting data for: {record}");
        let bytes = match self.fetcher.fetch_bytes(&record).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Cannot get the content for image: {record} ({e})");
                return ItemOutcome::FetchFailed {
                    reason: e.to_string(),
                };
            }
        };

        debug!("Processing image: {record}");
        match count_colors(&bytes) {
            Ok(count) => ItemOutcome::ColorCount(count),
            Err(e) => {
                warn!("Cannot decode the content for image: {record} ({e})");
                ItemOutcome::DecodeFailed {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Orchestrates a full census run: one metadata call, then every record
/// through the active engine, then reindexing to input order.
pub struct Pipeline {
    metadata: Arc<dyn MetadataFetcher>,
    worker: Arc<dyn ItemWorker>,
    engine: Box<dyn Engine>,
    metadata_timeout: Option<Duration>,
}

impl Pipeline {
    pub fn new(
        metadata: Arc<dyn MetadataFetcher>,
        worker: Arc<dyn ItemWorker>,
        engine: Box<dyn Engine>,
        metadata_timeout: Option<Duration>,
    ) -> Self {
        Self {
            metadata,
            worker,
            engine,
            metadata_timeout,
        }
    }

    /// Build the HTTP-backed pipeline for an engine kind.
    ///
    /// The process engine gets the bounded metadata wait from the
    /// configuration; the other engines wait without a limit.
    pub fn from_config(kind: EngineKind, config: &Config) -> Self {
        let fetcher: Arc<dyn ContentFetcher> = Arc::new(HttpContentFetcher::new());
        let metadata_timeout =
            (kind == EngineKind::Process).then_some(config.metadata_timeout);
        Self::new(
            Arc::new(HttpMetadataClient::new()),
            Arc::new(CensusWorker::new(fetcher)),
            kind.build(config),
            metadata_timeout,
        )
    }

    /// Run the pipeline against a fully-composed endpoint URL.
    ///
    /// An empty record set is the only batch-level failure: it is logged
    /// and yields an empty result vector, never an error value. Every
    /// other failure is captured per item.
    pub async fn run(&self, endpoint_url: &str) -> RunSummary {
        let started = Instant::now();

        let records = self.fetch_metadata(endpoint_url).await;
        if records.is_empty() {
            warn!("No usable metadata returned; nothing to process");
            return RunSummary {
                results: Vec::new(),
                elapsed: started.elapsed(),
            };
        }

        info!("Processing {} records", records.len());
        let tasks: Vec<ItemTask> = records
            .iter()
            .cloned()
            .enumerate()
            .map(|(index, record)| ItemTask { index, record })
            .collect();

        let completed = self.engine.execute(tasks, self.worker.clone()).await;

        // Completions arrive in engine order; place each one back into its
        // input slot. A slot an engine failed to report stays a failure
        // rather than silently shifting its neighbours.
        let mut outcomes: Vec<ItemOutcome> = vec![
            ItemOutcome::FetchFailed {
                reason: "engine did not report an outcome".to_string(),
            };
            records.len()
        ];
        for (index, outcome) in completed {
            if let Some(slot) = outcomes.get_mut(index) {
                *slot = outcome;
            }
        }

        let results = records
            .into_iter()
            .zip(outcomes)
            .map(|(record, outcome)| PipelineResult { record, outcome })
            .collect();

        RunSummary {
            results,
            elapsed: started.elapsed(),
        }
    }

    async fn fetch_metadata(&self, endpoint_url: &str) -> Vec<Record> {
        match self.metadata_timeout {
            Some(limit) => match timeout(limit, self.metadata.fetch(endpoint_url)).await {
                Ok(records) => records,
                Err(_) => {
                    warn!("Metadata fetch did not complete within {limit:?}");
                    Vec::new()
                }
            },
            None => self.metadata.fetch(endpoint_url).await,
        }
    }
}

impl From<&CensusError> for ItemOutcome {
    /// Fold an item-level error into its terminal outcome.
    fn from(err: &CensusError) -> Self {
        match err {
            CensusError::DecodeFailed(reason) => ItemOutcome::DecodeFailed {
                reason: reason.clone(),
            },
            other => ItemOutcome::FetchFailed {
                reason: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MockContentFetcher;

    fn record(kind: &str, url: &str) -> Record {
        Record {
            url: url.to_string(),
            kind: kind.to_string(),
            title: format!("title for {url}"),
            date: "2024-05-01".to_string(),
        }
    }

    #[tokio::test]
    async fn test_worker_skips_non_image_without_fetching() {
        let mut fetcher = MockContentFetcher::new();
        fetcher.expect_fetch_bytes().times(0);

        let worker = CensusWorker::new(Arc::new(fetcher));
        let outcome = worker
            .process(record("video", "https://example.com/v.mp4"))
            .await;
        assert_eq!(outcome, ItemOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_worker_records_fetch_failure() {
        let mut fetcher = MockContentFetcher::new();
        fetcher.expect_fetch_bytes().returning(|record| {
            Err(CensusError::ContentFetchFailed {
                url: record.url.clone(),
                reason: "HTTP 500 Internal Server Error".to_string(),
            })
        });

        let worker = CensusWorker::new(Arc::new(fetcher));
        let outcome = worker
            .process(record("image", "https://example.com/a.png"))
            .await;
        match outcome {
            ItemOutcome::FetchFailed { reason } => {
                assert!(reason.contains("https://example.com/a.png"));
            }
            other => panic!("expected FetchFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_worker_records_decode_failure_for_garbage_bytes() {
        let mut fetcher = MockContentFetcher::new();
        fetcher
            .expect_fetch_bytes()
            .returning(|_| Ok(b"not an image".to_vec()));

        let worker = CensusWorker::new(Arc::new(fetcher));
        let outcome = worker
            .process(record("image", "https://example.com/a.png"))
            .await;
        assert!(matches!(outcome, ItemOutcome::DecodeFailed { .. }));
    }

    #[test]
    fn test_outcome_roundtrips_through_json() {
        let outcomes = [
            ItemOutcome::ColorCount(42),
            ItemOutcome::Skipped,
            ItemOutcome::FetchFailed {
                reason: "HTTP 500".to_string(),
            },
            ItemOutcome::DecodeFailed {
                reason: "bad magic".to_string(),
            },
        ];
        for outcome in outcomes {
            let encoded = serde_json::to_string(&outcome).unwrap();
            let decoded: ItemOutcome = serde_json::from_str(&encoded).unwrap();
            assert_eq!(outcome, decoded);
        }
    }

    #[test]
    fn test_item_outcome_from_error() {
        let decode = CensusError::DecodeFailed("bad magic".to_string());
        assert!(matches!(
            ItemOutcome::from(&decode),
            ItemOutcome::DecodeFailed { .. }
        ));

        let fetch = CensusError::ContentFetchFailed {
            url: "u".to_string(),
            reason: "HTTP 404".to_string(),
        };
        assert!(matches!(
            ItemOutcome::from(&fetch),
            ItemOutcome::FetchFailed { .. }
        ));
    }
}
