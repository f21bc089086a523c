//! Generation parameters and the enums they are built from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Compute device the pipeline runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cuda,
    Cpu,
}

impl Device {
    pub fn as_str(&self) -> &'static str {
        match self {
            Device::Cuda => "cuda",
            Device::Cpu => "cpu",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a device string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid device: {0} (expected \"cuda\" or \"cpu\")")]
pub struct DeviceParseError(pub String);

impl FromStr for Device {
    type Err = DeviceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cuda" => Ok(Device::Cuda),
            "cpu" => Ok(Device::Cpu),
            _ => Err(DeviceParseError(s.to_string())),
        }
    }
}

/// Preprocessing mode applied before 3DMM extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocess {
    /// Crop to the detected face region
    Crop,
    /// Resize the whole frame
    Resize,
    /// Keep the full frame, paste the rendered face back
    Full,
    /// Crop with extended margins
    ExtCrop,
    /// Full frame with extended margins
    ExtFull,
}

impl Preprocess {
    pub fn as_str(&self) -> &'static str {
        match self {
            Preprocess::Crop => "crop",
            Preprocess::Resize => "resize",
            Preprocess::Full => "full",
            Preprocess::ExtCrop => "extcrop",
            Preprocess::ExtFull => "extfull",
        }
    }

    /// Whether this mode keeps the full frame (selects the still-mode
    /// facerender config and mapping checkpoint).
    pub fn is_full_frame(&self) -> bool {
        matches!(self, Preprocess::Full | Preprocess::ExtFull)
    }
}

impl fmt::Display for Preprocess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error parsing a preprocess string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid preprocess mode: {0}")]
pub struct PreprocessParseError(pub String);

impl FromStr for Preprocess {
    type Err = PreprocessParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "crop" => Ok(Preprocess::Crop),
            "resize" => Ok(Preprocess::Resize),
            "full" => Ok(Preprocess::Full),
            "extcrop" => Ok(Preprocess::ExtCrop),
            "extfull" => Ok(Preprocess::ExtFull),
            _ => Err(PreprocessParseError(s.to_string())),
        }
    }
}

/// Fully-resolved generation parameters for one job.
///
/// Built by the handler from the job's overrides and the worker's
/// env-sourced defaults; immutable from then on.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub pose_style: u32,
    pub device: Device,
    pub batch_size: u32,
    pub input_yaw: Option<Vec<i32>>,
    pub input_pitch: Option<Vec<i32>>,
    pub input_roll: Option<Vec<i32>>,
    pub size: u32,
    pub preprocess: Preprocess,
    pub still: bool,
    pub face3dvis: bool,
    pub expression_scale: f64,
    pub enhancer: Option<String>,
    pub background_enhancer: Option<String>,
}
