//! Error types for pipeline operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors that can occur while driving the inference pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Model interpreter not found: {0}")]
    InterpreterNotFound(String),

    #[error("Model script not found: {0}")]
    ScriptNotFound(PathBuf),

    #[error("Stage '{stage}' failed: {message}")]
    StageFailed {
        stage: &'static str,
        message: String,
        exit_code: Option<i32>,
    },

    #[error("Stage '{stage}' produced no parseable result")]
    MalformedOutput { stage: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn stage_failed(stage: &'static str, message: impl Into<String>) -> Self {
        Self::StageFailed {
            stage,
            message: message.into(),
            exit_code: None,
        }
    }
}
