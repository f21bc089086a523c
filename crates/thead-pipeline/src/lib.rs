//! Inference pipeline seam for the external talking-head model.
//!
//! This crate provides:
//! - The `InferenceEngine` trait the worker drives stages through
//! - A subprocess-backed implementation (`ModelCli`)
//! - Model asset path resolution (`ModelPaths`)
//! - The checkpoint manifest used at startup

pub mod checkpoints;
pub mod cli;
pub mod engine;
pub mod error;
pub mod paths;

pub use checkpoints::{checkpoint_manifest, CheckpointFile};
pub use cli::ModelCli;
pub use engine::{CoeffBatch, Extraction, ExtractionRequest, InferenceEngine, RenderBatch};
pub use error::{PipelineError, PipelineResult};
pub use paths::ModelPaths;
