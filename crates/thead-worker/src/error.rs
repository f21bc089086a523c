//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

/// Failure kinds a job can hit, from input validation through upload.
///
/// Every layer returns these as values; the runtime loop alone decides
/// process fatality.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("\"{0}\" is required in job input")]
    MissingInput(&'static str),

    #[error("Could not download {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] thead_pipeline::PipelineError),

    #[error("Storage error: {0}")]
    Storage(#[from] thead_storage::StorageError),

    #[error("Runtime API error: {0}")]
    Runtime(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn download_failed(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn extraction_failed(msg: impl Into<String>) -> Self {
        Self::ExtractionFailed(msg.into())
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::Runtime(msg.into())
    }
}
