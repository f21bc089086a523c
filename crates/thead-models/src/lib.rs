//! Shared data models for the talking-head worker.
//!
//! This crate provides Serde-serializable types for:
//! - Job requests and outputs (serverless runtime schema)
//! - Generation parameters and their defaults
//! - Small parsing helpers for env-sourced values

pub mod job;
pub mod params;
pub mod utils;

pub use job::{JobInput, JobOutput, JobRequest};
pub use params::{Device, DeviceParseError, GenerationParams, Preprocess, PreprocessParseError};
pub use utils::{parse_angle_list, parse_bool, AngleListError};
