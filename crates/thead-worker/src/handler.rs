//! Job handler: validation, asset downloads, device selection, delegation.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use thead_models::{Device, GenerationParams, JobInput, JobOutput};
use thead_pipeline::InferenceEngine;

use crate::config::GenerationDefaults;
use crate::download::download_file;
use crate::error::{WorkerError, WorkerResult};
use crate::generator::{JobAssets, ObjectStore, VideoGenerator};

/// Fixed local filenames for downloaded job assets.
const IMAGE_FILE: &str = "input_image.png";
const AUDIO_FILE: &str = "input_audio.wav";
const EYEBLINK_FILE: &str = "eyeroll.mp4";
const POSE_FILE: &str = "ref_pose.mp4";

/// One worker: resolves a job's assets and parameters and runs generation.
pub struct Worker<E, S> {
    http: reqwest::Client,
    generator: VideoGenerator<E, S>,
    defaults: GenerationDefaults,
    work_dir: PathBuf,
}

impl<E: InferenceEngine, S: ObjectStore> Worker<E, S> {
    pub fn new(
        http: reqwest::Client,
        generator: VideoGenerator<E, S>,
        defaults: GenerationDefaults,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            http,
            generator,
            defaults,
            work_dir: work_dir.into(),
        }
    }

    /// Handle one job: download assets, resolve parameters, generate.
    pub async fn handle(&self, input: &JobInput) -> WorkerResult<JobOutput> {
        let image_url = require(&input.input_image_url, "input_image_url")?;
        let audio_url = require(&input.input_audio_url, "input_audio_url")?;

        let source_image = download_file(&self.http, image_url, self.work_dir.join(IMAGE_FILE))
            .await?;
        let driven_audio = download_file(&self.http, audio_url, self.work_dir.join(AUDIO_FILE))
            .await?;

        // Reference videos are optional: a failed download drops that
        // reference with a warning instead of failing the job.
        let eyeblink_url = input
            .ref_eyeblink_url
            .as_deref()
            .or(self.defaults.ref_eyeblink_url.as_deref());
        let pose_url = input
            .ref_pose_url
            .as_deref()
            .or(self.defaults.ref_pose_url.as_deref());

        let ref_eyeblink = match eyeblink_url {
            Some(url) => self.download_reference(url, EYEBLINK_FILE, "eye-blink").await,
            None => None,
        };

        let ref_pose = match pose_url {
            // Same URL as the eye-blink reference: reuse its local file so
            // the generator can skip re-extraction.
            Some(url) if eyeblink_url == Some(url) && ref_eyeblink.is_some() => {
                ref_eyeblink.clone()
            }
            Some(url) => self.download_reference(url, POSE_FILE, "pose").await,
            None => None,
        };

        let device = select_device(requested_device(input, &self.defaults), cuda_available());
        info!("Selected device: {}", device);

        let params = resolve_params(input, &self.defaults, device);
        let assets = JobAssets {
            source_image,
            driven_audio,
            ref_eyeblink,
            ref_pose,
        };

        let output_video_url = self.generator.generate(&assets, &params).await?;
        Ok(JobOutput { output_video_url })
    }

    async fn download_reference(&self, url: &str, file: &str, kind: &str) -> Option<PathBuf> {
        match download_file(&self.http, url, self.work_dir.join(file)).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Could not download {} reference {}: {}", kind, url, e);
                None
            }
        }
    }
}

fn require<'a>(field: &'a Option<String>, name: &'static str) -> WorkerResult<&'a str> {
    field
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or(WorkerError::MissingInput(name))
}

/// Device the job asked for, if any (job override wins over env default).
fn requested_device(input: &JobInput, defaults: &GenerationDefaults) -> Option<Device> {
    input
        .device
        .as_deref()
        .and_then(|s| s.parse().ok())
        .or(defaults.device)
}

/// cuda when available and not explicitly overridden to cpu, else cpu.
fn select_device(requested: Option<Device>, cuda_available: bool) -> Device {
    match requested {
        Some(Device::Cpu) => Device::Cpu,
        _ if cuda_available => Device::Cuda,
        _ => Device::Cpu,
    }
}

/// Whether a CUDA-capable GPU is usable from this process.
fn cuda_available() -> bool {
    which::which("nvidia-smi").is_ok() || Path::new("/dev/nvidia0").exists()
}

/// Merge per-job overrides with the env-sourced defaults.
fn resolve_params(
    input: &JobInput,
    defaults: &GenerationDefaults,
    device: Device,
) -> GenerationParams {
    GenerationParams {
        pose_style: input.pose_style.unwrap_or(defaults.pose_style),
        device,
        batch_size: input.batch_size.unwrap_or(defaults.batch_size),
        input_yaw: input.input_yaw.clone().or_else(|| defaults.input_yaw.clone()),
        input_pitch: input
            .input_pitch
            .clone()
            .or_else(|| defaults.input_pitch.clone()),
        input_roll: input
            .input_roll
            .clone()
            .or_else(|| defaults.input_roll.clone()),
        size: input.size.unwrap_or(defaults.size),
        preprocess: input
            .preprocess
            .as_deref()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.preprocess),
        still: input.still.unwrap_or(defaults.still),
        face3dvis: input.face3dvis.unwrap_or(defaults.face3dvis),
        expression_scale: input.expression_scale.unwrap_or(defaults.expression_scale),
        enhancer: input.enhancer.clone().or_else(|| defaults.enhancer.clone()),
        background_enhancer: input
            .background_enhancer
            .clone()
            .or_else(|| defaults.background_enhancer.clone()),
    }
}
