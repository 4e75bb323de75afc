use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CensusError {
    #[error("metadata endpoint unavailable: {0}")]
    MetadataUnavailable(String),

    #[error("content fetch failed for {url}: {reason}")]
    ContentFetchFailed { url: String, reason: String },

    #[error("image decode failed: {0}")]
    DecodeFailed(String),

    #[error("configuration error: {0}")]
    ConfigurationError(String),

    #[error("worker process error: {0}")]
    WorkerError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl CensusError {
    /// Whether the failure is confined to a single record.
    ///
    /// Item-level failures are captured into that record's outcome and never
    /// abort the batch; everything else surfaces at the run boundary.
    pub fn is_item_level(&self) -> bool {
        matches!(
            self,
            CensusError::ContentFetchFailed { .. }
                | CensusError::DecodeFailed(_)
                | CensusError::WorkerError(_)
        )
    }
}

impl From<std::io::Error> for CensusError {
    fn from(err: std::io::Error) -> Self {
        CensusError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for CensusError {
    fn from(err: serde_json::Error) -> Self {
        CensusError::SerializationError(err.to_string())
    }
}

impl From<image::ImageError> for CensusError {
    fn from(err: image::ImageError) -> Self {
        CensusError::DecodeFailed(err.to_string())
    }
}
