//! The inference-engine seam.
//!
//! The actual face modeling, audio-to-coefficient regression and neural
//! rendering live in the external model library; this trait captures the
//! four operations the worker drives, with the same argument bundles the
//! library's stages take.

use std::path::{Path, PathBuf};

use thead_models::{Device, Preprocess};

use crate::error::PipelineResult;
use crate::paths::ModelPaths;

/// Inputs for face-crop/3DMM extraction of an image or reference video.
#[derive(Debug, Clone)]
pub struct ExtractionRequest<'a> {
    pub paths: &'a ModelPaths,
    pub device: Device,
    /// Source image or reference video
    pub input: &'a Path,
    /// Directory the stage writes frames and coefficients into
    pub out_dir: &'a Path,
    pub preprocess: Preprocess,
    /// True for the source image, false for reference videos
    pub source_image: bool,
    pub size: u32,
}

/// Output of the extraction stage.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// 3DMM coefficient file; `None` when no face was detected
    pub coeff_path: Option<PathBuf>,
    /// Cropped face image
    pub cropped_image: PathBuf,
    /// Opaque crop geometry, passed through to the renderer
    pub crop_info: serde_json::Value,
}

/// Inputs for audio-to-coefficient inference.
#[derive(Debug, Clone)]
pub struct CoeffBatch<'a> {
    pub paths: &'a ModelPaths,
    pub device: Device,
    /// Source-image coefficients
    pub first_coeff: &'a Path,
    pub audio: &'a Path,
    pub out_dir: &'a Path,
    pub pose_style: u32,
    pub still: bool,
    pub ref_eyeblink_coeff: Option<&'a Path>,
    pub ref_pose_coeff: Option<&'a Path>,
}

/// Inputs for coefficient-to-video rendering.
#[derive(Debug, Clone)]
pub struct RenderBatch<'a> {
    pub paths: &'a ModelPaths,
    pub device: Device,
    /// Coefficients produced by audio-to-coefficient inference
    pub coeff_path: &'a Path,
    pub cropped_image: &'a Path,
    pub first_coeff: &'a Path,
    pub audio: &'a Path,
    /// Original (uncropped) source image, needed for full-frame paste-back
    pub source_image: &'a Path,
    pub crop_info: &'a serde_json::Value,
    pub out_dir: &'a Path,
    pub batch_size: u32,
    pub input_yaw: Option<&'a [i32]>,
    pub input_pitch: Option<&'a [i32]>,
    pub input_roll: Option<&'a [i32]>,
    pub expression_scale: f64,
    pub still: bool,
    pub preprocess: Preprocess,
    pub size: u32,
    pub enhancer: Option<&'a str>,
    pub background_enhancer: Option<&'a str>,
}

/// The four pipeline stages the worker sequences.
#[allow(async_fn_in_trait)]
pub trait InferenceEngine {
    /// Extract a face crop and 3DMM coefficients from an image or video.
    async fn extract(&self, req: ExtractionRequest<'_>) -> PipelineResult<Extraction>;

    /// Run audio-to-coefficient inference; returns the coefficient file.
    async fn audio_to_coeffs(&self, batch: CoeffBatch<'_>) -> PipelineResult<PathBuf>;

    /// Render the supplementary 3D-face visualization video.
    async fn render_face3d(
        &self,
        paths: &ModelPaths,
        device: Device,
        first_coeff: &Path,
        coeff_path: &Path,
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<()>;

    /// Render the final video from coefficients; returns the video file.
    async fn render(&self, batch: RenderBatch<'_>) -> PipelineResult<PathBuf>;
}
