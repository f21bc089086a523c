//! Serverless talking-head video generation worker.
//!
//! This crate provides:
//! - The job handler (input validation, asset downloads, device selection)
//! - The video generator (stage sequencing, upload, cleanup)
//! - Startup utilities (network-volume linking, checkpoint sync)
//! - The serverless runtime poll loop

pub mod config;
pub mod download;
pub mod error;
pub mod generator;
pub mod handler;
pub mod runtime;
pub mod startup;

pub use config::{GenerationDefaults, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use generator::{JobAssets, ObjectStore, VideoGenerator, OUTPUT_BUCKET};
pub use handler::Worker;
pub use runtime::{JobPoller, RuntimeConfig};
