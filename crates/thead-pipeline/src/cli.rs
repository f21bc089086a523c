//! Subprocess-backed inference engine.
//!
//! Each stage is a script shipped with the model library, invoked through
//! its Python interpreter. A stage prints a single JSON object as the final
//! line of stdout; everything before it is free-form model chatter. Non-zero
//! exits surface as `StageFailed` with a stderr tail.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;

use thead_models::Device;

use crate::engine::{CoeffBatch, Extraction, ExtractionRequest, InferenceEngine, RenderBatch};
use crate::error::{PipelineError, PipelineResult};
use crate::paths::ModelPaths;

/// How many trailing stderr bytes to keep in error messages.
const STDERR_TAIL: usize = 2048;

/// Inference engine that shells out to the model library's stage scripts.
#[derive(Debug, Clone)]
pub struct ModelCli {
    interpreter: String,
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct ExtractResult {
    coeff_path: Option<PathBuf>,
    cropped_image: PathBuf,
    #[serde(default)]
    crop_info: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CoeffResult {
    coeff_path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RenderResult {
    video_path: PathBuf,
}

impl ModelCli {
    /// Create an engine invoking `interpreter` on scripts under `root`.
    pub fn new(interpreter: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            root: root.into(),
        }
    }

    /// Create from `MODEL_PYTHON` / `MODEL_ROOT` environment variables.
    pub fn from_env() -> Self {
        Self::new(
            std::env::var("MODEL_PYTHON").unwrap_or_else(|_| "python3".to_string()),
            std::env::var("MODEL_ROOT").unwrap_or_else(|_| "/app/SadTalker".to_string()),
        )
    }

    async fn run_stage(
        &self,
        stage: &'static str,
        script: &str,
        args: Vec<String>,
    ) -> PipelineResult<serde_json::Value> {
        let script_path = self.root.join(script);
        if !script_path.exists() {
            return Err(PipelineError::ScriptNotFound(script_path));
        }

        which::which(&self.interpreter)
            .map_err(|_| PipelineError::InterpreterNotFound(self.interpreter.clone()))?;

        debug!(stage, script = %script_path.display(), "Running model stage");

        let output = Command::new(&self.interpreter)
            .arg(&script_path)
            .args(&args)
            .current_dir(&self.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail_start = stderr.len().saturating_sub(STDERR_TAIL);
            return Err(PipelineError::StageFailed {
                stage,
                message: stderr[tail_start..].to_string(),
                exit_code: output.status.code(),
            });
        }

        parse_stage_output(stage, &output.stdout)
    }
}

/// Parse the final non-empty stdout line as the stage's JSON result.
fn parse_stage_output(stage: &'static str, stdout: &[u8]) -> PipelineResult<serde_json::Value> {
    let text = String::from_utf8_lossy(stdout);
    let line = text
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .ok_or(PipelineError::MalformedOutput { stage })?;

    serde_json::from_str(line.trim()).map_err(|_| PipelineError::MalformedOutput { stage })
}

fn angle_arg(args: &mut Vec<String>, flag: &str, angles: Option<&[i32]>) {
    if let Some(angles) = angles {
        if !angles.is_empty() {
            args.push(flag.to_string());
            args.push(
                angles
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
            );
        }
    }
}

fn path_arg(args: &mut Vec<String>, flag: &str, path: &Path) {
    args.push(flag.to_string());
    args.push(path.to_string_lossy().to_string());
}

fn common_model_args(args: &mut Vec<String>, paths: &ModelPaths, device: Device) {
    path_arg(args, "--checkpoint", &paths.checkpoint);
    path_arg(args, "--mapping-checkpoint", &paths.mapping_checkpoint);
    path_arg(args, "--audio2pose-config", &paths.audio2pose_config);
    path_arg(args, "--audio2exp-config", &paths.audio2exp_config);
    path_arg(args, "--facerender-config", &paths.facerender_config);
    args.push("--device".to_string());
    args.push(device.as_str().to_string());
}

impl InferenceEngine for ModelCli {
    async fn extract(&self, req: ExtractionRequest<'_>) -> PipelineResult<Extraction> {
        let mut args = Vec::new();
        common_model_args(&mut args, req.paths, req.device);
        path_arg(&mut args, "--input", req.input);
        path_arg(&mut args, "--out-dir", req.out_dir);
        args.push("--preprocess".to_string());
        args.push(req.preprocess.as_str().to_string());
        args.push("--size".to_string());
        args.push(req.size.to_string());
        if req.source_image {
            args.push("--source-image".to_string());
        }

        let value = self.run_stage("extract", "bin/extract.py", args).await?;
        let result: ExtractResult =
            serde_json::from_value(value).map_err(|_| PipelineError::MalformedOutput {
                stage: "extract",
            })?;

        Ok(Extraction {
            coeff_path: result.coeff_path,
            cropped_image: result.cropped_image,
            crop_info: result.crop_info,
        })
    }

    async fn audio_to_coeffs(&self, batch: CoeffBatch<'_>) -> PipelineResult<PathBuf> {
        let mut args = Vec::new();
        common_model_args(&mut args, batch.paths, batch.device);
        path_arg(&mut args, "--first-coeff", batch.first_coeff);
        path_arg(&mut args, "--audio", batch.audio);
        path_arg(&mut args, "--out-dir", batch.out_dir);
        args.push("--pose-style".to_string());
        args.push(batch.pose_style.to_string());
        if batch.still {
            args.push("--still".to_string());
        }
        if let Some(p) = batch.ref_eyeblink_coeff {
            path_arg(&mut args, "--ref-eyeblink-coeff", p);
        }
        if let Some(p) = batch.ref_pose_coeff {
            path_arg(&mut args, "--ref-pose-coeff", p);
        }

        let value = self
            .run_stage("audio2coeff", "bin/audio2coeff.py", args)
            .await?;
        let result: CoeffResult =
            serde_json::from_value(value).map_err(|_| PipelineError::MalformedOutput {
                stage: "audio2coeff",
            })?;

        Ok(result.coeff_path)
    }

    async fn render_face3d(
        &self,
        paths: &ModelPaths,
        device: Device,
        first_coeff: &Path,
        coeff_path: &Path,
        audio: &Path,
        output: &Path,
    ) -> PipelineResult<()> {
        let mut args = Vec::new();
        common_model_args(&mut args, paths, device);
        path_arg(&mut args, "--first-coeff", first_coeff);
        path_arg(&mut args, "--coeff", coeff_path);
        path_arg(&mut args, "--audio", audio);
        path_arg(&mut args, "--output", output);

        self.run_stage("face3d", "bin/face3d_vis.py", args).await?;
        Ok(())
    }

    async fn render(&self, batch: RenderBatch<'_>) -> PipelineResult<PathBuf> {
        let mut args = Vec::new();
        common_model_args(&mut args, batch.paths, batch.device);
        path_arg(&mut args, "--coeff", batch.coeff_path);
        path_arg(&mut args, "--cropped-image", batch.cropped_image);
        path_arg(&mut args, "--first-coeff", batch.first_coeff);
        path_arg(&mut args, "--audio", batch.audio);
        path_arg(&mut args, "--source-image", batch.source_image);
        path_arg(&mut args, "--out-dir", batch.out_dir);
        args.push("--crop-info".to_string());
        args.push(batch.crop_info.to_string());
        args.push("--batch-size".to_string());
        args.push(batch.batch_size.to_string());
        angle_arg(&mut args, "--input-yaw", batch.input_yaw);
        angle_arg(&mut args, "--input-pitch", batch.input_pitch);
        angle_arg(&mut args, "--input-roll", batch.input_roll);
        args.push("--expression-scale".to_string());
        args.push(batch.expression_scale.to_string());
        if batch.still {
            args.push("--still".to_string());
        }
        args.push("--preprocess".to_string());
        args.push(batch.preprocess.as_str().to_string());
        args.push("--size".to_string());
        args.push(batch.size.to_string());
        if let Some(e) = batch.enhancer {
            args.push("--enhancer".to_string());
            args.push(e.to_string());
        }
        if let Some(e) = batch.background_enhancer {
            args.push("--background-enhancer".to_string());
            args.push(e.to_string());
        }

        let value = self.run_stage("render", "bin/facerender.py", args).await?;
        let result: RenderResult =
            serde_json::from_value(value).map_err(|_| PipelineError::MalformedOutput {
                stage: "render",
            })?;

        Ok(result.video_path)
    }
}
