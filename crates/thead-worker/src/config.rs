//! Worker configuration.
//!
//! All configuration is environment-sourced and read once at startup; the
//! resulting structs are passed down instead of scattering `env::var` calls
//! through the pipeline.

use std::path::PathBuf;

use thead_models::{parse_angle_list, parse_bool, Device, Preprocess};

/// Filesystem and runtime configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory downloaded job assets are written into
    pub work_dir: PathBuf,
    /// Directory per-job working directories are created under
    pub result_dir: PathBuf,
    /// Root of the external model library installation
    pub model_root: PathBuf,
    /// Directory holding the model's stage config files
    pub config_dir: PathBuf,
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let model_root = PathBuf::from(
            std::env::var("MODEL_ROOT").unwrap_or_else(|_| "/app/SadTalker".to_string()),
        );
        let config_dir = std::env::var("MODEL_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_root.join("src/config"));

        Self {
            work_dir: std::env::var("WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            result_dir: std::env::var("RESULT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("results")),
            model_root,
            config_dir,
        }
    }
}

/// Env-sourced defaults for every generation parameter.
///
/// A job may override any of these per request; absent fields fall back
/// here.
#[derive(Debug, Clone)]
pub struct GenerationDefaults {
    pub pose_style: u32,
    /// Preferred device; `Some(Cpu)` forces CPU even when a GPU is present
    pub device: Option<Device>,
    pub batch_size: u32,
    pub input_yaw: Option<Vec<i32>>,
    pub input_pitch: Option<Vec<i32>>,
    pub input_roll: Option<Vec<i32>>,
    pub ref_eyeblink_url: Option<String>,
    pub ref_pose_url: Option<String>,
    pub size: u32,
    pub preprocess: Preprocess,
    pub still: bool,
    pub face3dvis: bool,
    pub expression_scale: f64,
    pub enhancer: Option<String>,
    pub background_enhancer: Option<String>,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            pose_style: 45,
            device: None,
            batch_size: 2,
            input_yaw: None,
            input_pitch: None,
            input_roll: None,
            ref_eyeblink_url: None,
            ref_pose_url: None,
            size: 512,
            preprocess: Preprocess::Full,
            still: true,
            face3dvis: false,
            expression_scale: 1.0,
            enhancer: Some("gfpgan".to_string()),
            background_enhancer: None,
        }
    }
}

impl GenerationDefaults {
    /// Create defaults from the `DEFAULT_*` environment variables.
    pub fn from_env() -> Self {
        let base = Self::default();

        Self {
            pose_style: std::env::var("DEFAULT_POSE_STYLE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.pose_style),
            device: std::env::var("DEFAULT_DEVICE")
                .ok()
                .and_then(|s| s.parse().ok()),
            batch_size: std::env::var("DEFAULT_BATCH_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.batch_size),
            input_yaw: env_angle_list("DEFAULT_INPUT_YAW"),
            input_pitch: env_angle_list("DEFAULT_INPUT_PITCH"),
            input_roll: env_angle_list("DEFAULT_INPUT_ROLL"),
            ref_eyeblink_url: env_non_empty("DEFAULT_REF_EYEBLINK_URL"),
            ref_pose_url: env_non_empty("DEFAULT_REF_POSE_URL"),
            size: std::env::var("DEFAULT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.size),
            preprocess: std::env::var("DEFAULT_PREPROCESS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.preprocess),
            still: std::env::var("DEFAULT_STILL")
                .map(|s| parse_bool(&s))
                .unwrap_or(base.still),
            face3dvis: std::env::var("DEFAULT_FACE3DVIS")
                .map(|s| parse_bool(&s))
                .unwrap_or(base.face3dvis),
            expression_scale: std::env::var("DEFAULT_EXPRESSION_SCALE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(base.expression_scale),
            enhancer: std::env::var("DEFAULT_ENHANCER")
                .map(non_empty)
                .unwrap_or(base.enhancer),
            background_enhancer: std::env::var("DEFAULT_BACKGROUND_ENHANCER")
                .map(non_empty)
                .unwrap_or(base.background_enhancer),
        }
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(non_empty)
}

fn env_angle_list(key: &str) -> Option<Vec<i32>> {
    std::env::var(key)
        .ok()
        .and_then(|s| parse_angle_list(&s).ok())
        .filter(|v| !v.is_empty())
}
