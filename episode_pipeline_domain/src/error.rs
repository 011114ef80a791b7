//! Error taxonomy for the episode ingestion worker.
//!
//! One enum covers every failure mode named across the pipeline's adapters so
//! that retry and drain decisions can dispatch on the error variant itself
//! rather than on ad-hoc string matching at each call site.

use thiserror::Error;

/// Top-level error type returned by every domain port.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// The downloader tool's metadata probe failed (non-zero exit or JSON
    /// parse failure).
    #[error("metadata fetch failed: {0}")]
    MetadataError(String),

    /// A download leg (audio or video) failed.
    #[error("download failed: {0}")]
    DownloadError(String),

    /// A download leg failed with the fatal yt-dlp signature (extractor
    /// breakage, HTTP 403 after cookie refresh) that should escalate to a
    /// drain rather than a retry.
    #[error("fatal downloader condition: {0}")]
    FatalDownloaderError(String),

    /// Muxing the two download legs into one file failed.
    #[error("mux failed: {0}")]
    MuxError(String),

    /// Adaptive-bitrate transcode failed for every rung of the ladder.
    #[error("transcode failed: {0}")]
    TranscodeError(String),

    /// Object-storage operation failed.
    #[error("object storage error: {0}")]
    StorageError(String),

    /// Object-storage operation failed with a non-retryable auth error.
    #[error("object storage auth error: {0}")]
    StorageAuthError(String),

    /// Catalog operation failed.
    #[error("catalog error: {0}")]
    CatalogError(String),

    /// `SELECT ... FOR UPDATE NOWAIT` could not acquire the row lock.
    /// Retryable: the caller should back off and retry `find_or_create`.
    #[error("catalog row busy: {0}")]
    CatalogBusy(String),

    /// A catalog write's read-back did not match the intended patch.
    #[error("catalog verification failed: {0}")]
    CatalogVerificationFailed(String),

    /// Enrichment (LLM) call failed. Always non-fatal to the pipeline;
    /// carried as a distinct variant so provenance can record it.
    #[error("enrichment error: {0}")]
    EnrichmentError(String),

    /// Message queue operation (receive/extend/delete) failed.
    #[error("queue error: {0}")]
    QueueError(String),

    /// Post-pipeline validation found an integrity problem.
    #[error("validation failed: {0}")]
    ValidationError(String),

    /// Startup configuration was missing or malformed.
    #[error("configuration error: {0}")]
    ConfigurationError(String),

    /// Operation exceeded its allotted time budget.
    #[error("operation timed out: {0}")]
    TimeoutError(String),

    /// Shutdown was requested while the operation was in flight.
    #[error("cancelled by shutdown")]
    Cancelled,

    /// Anything else; should be rare in mature code paths.
    #[error("internal error: {0}")]
    InternalError(String),
}

impl WorkerError {
    pub fn metadata_error(msg: impl Into<String>) -> Self {
        Self::MetadataError(msg.into())
    }

    pub fn download_error(msg: impl Into<String>) -> Self {
        Self::DownloadError(msg.into())
    }

    pub fn storage_error(msg: impl Into<String>) -> Self {
        Self::StorageError(msg.into())
    }

    pub fn catalog_error(msg: impl Into<String>) -> Self {
        Self::CatalogError(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Feeds `with_retry`'s `is_retryable` predicate (§4.1, §7).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::DownloadError(_)
                | Self::MuxError(_)
                | Self::StorageError(_)
                | Self::CatalogBusy(_)
                | Self::QueueError(_)
                | Self::TimeoutError(_)
        )
    }

    /// Feeds the poller's/orchestrator's drain decision (§4.2, §4.10, §6).
    pub fn is_fatal_downloader(&self) -> bool {
        matches!(self, Self::FatalDownloaderError(_))
    }

    /// True for errors a caller should never retry regardless of budget
    /// (auth failures, validation, malformed config).
    pub fn is_non_retryable_auth_or_validation(&self) -> bool {
        matches!(
            self,
            Self::StorageAuthError(_) | Self::ValidationError(_) | Self::ConfigurationError(_)
        )
    }

    /// Short, stable category tag used as the `errorName` metrics label.
    pub fn category(&self) -> &'static str {
        match self {
            Self::MetadataError(_) => "metadata",
            Self::DownloadError(_) => "download",
            Self::FatalDownloaderError(_) => "download_fatal",
            Self::MuxError(_) => "mux",
            Self::TranscodeError(_) => "transcode",
            Self::StorageError(_) => "storage",
            Self::StorageAuthError(_) => "storage_auth",
            Self::CatalogError(_) => "catalog",
            Self::CatalogBusy(_) => "catalog_busy",
            Self::CatalogVerificationFailed(_) => "catalog_verification",
            Self::EnrichmentError(_) => "enrichment",
            Self::QueueError(_) => "queue",
            Self::ValidationError(_) => "validation",
            Self::ConfigurationError(_) => "configuration",
            Self::TimeoutError(_) => "timeout",
            Self::Cancelled => "cancelled",
            Self::InternalError(_) => "internal",
        }
    }
}

impl From<std::io::Error> for WorkerError {
    fn from(err: std::io::Error) -> Self {
        Self::InternalError(format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for WorkerError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(format!("json error: {err}"))
    }
}

pub type WorkerResult<T> = Result<T, WorkerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(WorkerError::download_error("timeout").is_retryable());
        assert!(WorkerError::CatalogBusy("locked".into()).is_retryable());
        assert!(!WorkerError::ValidationError("bad".into()).is_retryable());
    }

    #[test]
    fn fatal_downloader_is_distinct_from_generic_download_error() {
        let fatal = WorkerError::FatalDownloaderError("extractor broke".into());
        assert!(fatal.is_fatal_downloader());
        assert!(!fatal.is_retryable());

        let generic = WorkerError::download_error("connection reset");
        assert!(!generic.is_fatal_downloader());
        assert!(generic.is_retryable());
    }

    #[test]
    fn category_is_stable_for_metrics_labels() {
        assert_eq!(WorkerError::MetadataError("x".into()).category(), "metadata");
        assert_eq!(WorkerError::CatalogBusy("x".into()).category(), "catalog_busy");
    }

    #[test]
    fn auth_errors_are_never_retryable() {
        let err = WorkerError::StorageAuthError("403".into());
        assert!(!err.is_retryable());
        assert!(err.is_non_retryable_auth_or_validation());
    }
}
