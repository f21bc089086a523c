//! S3-compatible object storage client.
//!
//! This crate provides:
//! - Public-read file upload to a fixed bucket
//! - Public URL construction (`{endpoint}/{bucket}/{object}`)

pub mod client;
pub mod error;

pub use client::{public_url, BucketConfig, S3Client};
pub use error::{StorageError, StorageResult};
