//! Video generator: drives the pipeline stages in fixed order.
//!
//! One call to [`VideoGenerator::generate`] owns one timestamped working
//! directory. Stages run strictly in sequence with no retries; the working
//! directory is deleted only on the success path, so a failure after the
//! expensive inference stages leaves it on disk for inspection.

use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use thead_models::GenerationParams;
use thead_pipeline::{
    CoeffBatch, ExtractionRequest, InferenceEngine, ModelPaths, RenderBatch,
};
use thead_storage::{S3Client, StorageResult};

use crate::error::{WorkerError, WorkerResult};

/// Fixed bucket rendered videos are uploaded to.
pub const OUTPUT_BUCKET: &str = "sadtalker";

/// Seam for the object-storage upload.
#[allow(async_fn_in_trait)]
pub trait ObjectStore {
    async fn upload_public(
        &self,
        path: &Path,
        bucket: &str,
        object_name: &str,
        content_type: &str,
    ) -> StorageResult<String>;
}

impl ObjectStore for S3Client {
    async fn upload_public(
        &self,
        path: &Path,
        bucket: &str,
        object_name: &str,
        content_type: &str,
    ) -> StorageResult<String> {
        S3Client::upload_public(self, path, bucket, object_name, content_type).await
    }
}

/// Local paths of the job's downloaded assets.
#[derive(Debug, Clone, Default)]
pub struct JobAssets {
    pub source_image: PathBuf,
    pub driven_audio: PathBuf,
    pub ref_eyeblink: Option<PathBuf>,
    pub ref_pose: Option<PathBuf>,
}

/// Drives extraction, audio-to-coefficient inference and rendering, then
/// uploads the result.
pub struct VideoGenerator<E, S> {
    engine: E,
    store: S,
    result_dir: PathBuf,
    model_root: PathBuf,
    config_dir: PathBuf,
}

impl<E: InferenceEngine, S: ObjectStore> VideoGenerator<E, S> {
    pub fn new(
        engine: E,
        store: S,
        result_dir: impl Into<PathBuf>,
        model_root: impl Into<PathBuf>,
        config_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            store,
            result_dir: result_dir.into(),
            model_root: model_root.into(),
            config_dir: config_dir.into(),
        }
    }

    /// Generate a talking-head video and return its public URL.
    pub async fn generate(
        &self,
        assets: &JobAssets,
        params: &GenerationParams,
    ) -> WorkerResult<String> {
        let stamp = Local::now().format("%Y_%m_%d_%H.%M.%S").to_string();
        let save_dir = self.result_dir.join(&stamp);
        tokio::fs::create_dir_all(&save_dir).await?;

        let paths = ModelPaths::resolve(
            self.model_root.join("checkpoints"),
            &self.config_dir,
            params.size,
            params.preprocess,
        );

        // Crop the source image and extract its 3DMM coefficients.
        let first_frame_dir = save_dir.join("first_frame_dir");
        tokio::fs::create_dir_all(&first_frame_dir).await?;
        info!("3DMM extraction for source image");
        let extraction = self
            .engine
            .extract(ExtractionRequest {
                paths: &paths,
                device: params.device,
                input: &assets.source_image,
                out_dir: &first_frame_dir,
                preprocess: params.preprocess,
                source_image: true,
                size: params.size,
            })
            .await?;

        let first_coeff = extraction.coeff_path.ok_or_else(|| {
            WorkerError::extraction_failed("can't get the coefficients of the input image")
        })?;

        let ref_eyeblink_coeff = match &assets.ref_eyeblink {
            Some(video) => {
                info!("3DMM extraction for the eye-blink reference video");
                self.extract_reference(&paths, params, video, &save_dir)
                    .await?
            }
            None => None,
        };

        let ref_pose_coeff = match &assets.ref_pose {
            // Same reference as the eye-blink video: reuse its coefficients.
            Some(video) if assets.ref_eyeblink.as_deref() == Some(video.as_path()) => {
                ref_eyeblink_coeff.clone()
            }
            Some(video) => {
                info!("3DMM extraction for the pose reference video");
                self.extract_reference(&paths, params, video, &save_dir)
                    .await?
            }
            None => None,
        };

        // Audio-to-coefficient inference.
        let coeff_path = self
            .engine
            .audio_to_coeffs(CoeffBatch {
                paths: &paths,
                device: params.device,
                first_coeff: &first_coeff,
                audio: &assets.driven_audio,
                out_dir: &save_dir,
                pose_style: params.pose_style,
                still: params.still,
                ref_eyeblink_coeff: ref_eyeblink_coeff.as_deref(),
                ref_pose_coeff: ref_pose_coeff.as_deref(),
            })
            .await?;

        if params.face3dvis {
            info!("Rendering 3D face visualization");
            self.engine
                .render_face3d(
                    &paths,
                    params.device,
                    &first_coeff,
                    &coeff_path,
                    &assets.driven_audio,
                    &save_dir.join("3dface.mp4"),
                )
                .await?;
        }

        // Coefficient-to-video rendering.
        info!("Rendering final video");
        let rendered = self
            .engine
            .render(RenderBatch {
                paths: &paths,
                device: params.device,
                coeff_path: &coeff_path,
                cropped_image: &extraction.cropped_image,
                first_coeff: &first_coeff,
                audio: &assets.driven_audio,
                source_image: &assets.source_image,
                crop_info: &extraction.crop_info,
                out_dir: &save_dir,
                batch_size: params.batch_size,
                input_yaw: params.input_yaw.as_deref(),
                input_pitch: params.input_pitch.as_deref(),
                input_roll: params.input_roll.as_deref(),
                expression_scale: params.expression_scale,
                still: params.still,
                preprocess: params.preprocess,
                size: params.size,
                enhancer: params.enhancer.as_deref(),
                background_enhancer: params.background_enhancer.as_deref(),
            })
            .await?;

        // Publish under the working-directory timestamp.
        let object_name = format!("{stamp}.mp4");
        let output_path = self.result_dir.join(&object_name);
        move_file(&rendered, &output_path).await?;

        let url = self
            .store
            .upload_public(&output_path, OUTPUT_BUCKET, &object_name, "video/mp4")
            .await?;

        tokio::fs::remove_dir_all(&save_dir).await?;

        Ok(url)
    }

    /// Extract coefficients from a reference video into a subdirectory named
    /// after it. A reference with no detectable face is dropped (the stage
    /// result carries no coefficient path), not treated as a job failure.
    async fn extract_reference(
        &self,
        paths: &ModelPaths,
        params: &GenerationParams,
        video: &Path,
        save_dir: &Path,
    ) -> WorkerResult<Option<PathBuf>> {
        let name = video
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("reference");
        let frame_dir = save_dir.join(name);
        tokio::fs::create_dir_all(&frame_dir).await?;

        let extraction = self
            .engine
            .extract(ExtractionRequest {
                paths,
                device: params.device,
                input: video,
                out_dir: &frame_dir,
                preprocess: params.preprocess,
                source_image: false,
                size: params.size,
            })
            .await?;

        if extraction.coeff_path.is_none() {
            warn!(
                "No coefficients extracted from reference video {}",
                video.display()
            );
        }

        Ok(extraction.coeff_path)
    }
}

/// Move a file, falling back to copy-and-delete for cross-device moves.
async fn move_file(src: &Path, dst: &Path) -> WorkerResult<()> {
    if let Some(parent) = dst.parent() {
        if !parent.exists() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(src, dst).await?;
            tokio::fs::remove_file(src).await?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use thead_models::{Device, Preprocess};
    use thead_pipeline::{Extraction, PipelineResult};
    use thead_storage::StorageError;

    fn test_params() -> GenerationParams {
        GenerationParams {
            pose_style: 45,
            device: Device::Cpu,
            batch_size: 2,
            input_yaw: None,
            input_pitch: None,
            input_roll: None,
            size: 512,
            preprocess: Preprocess::Full,
            still: true,
            face3dvis: false,
            expression_scale: 1.0,
            enhancer: Some("gfpgan".to_string()),
            background_enhancer: None,
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        /// (input path, source_image flag) per extract call
        extract_calls: Mutex<Vec<(PathBuf, bool)>>,
        /// Captured (eyeblink, pose) reference coefficients
        coeff_refs: Mutex<Option<(Option<PathBuf>, Option<PathBuf>)>>,
        face3d_calls: Mutex<usize>,
        source_has_no_face: bool,
    }

    impl InferenceEngine for FakeEngine {
        async fn extract(&self, req: ExtractionRequest<'_>) -> PipelineResult<Extraction> {
            self.extract_calls
                .lock()
                .unwrap()
                .push((req.input.to_path_buf(), req.source_image));

            let coeff_path = if req.source_image && self.source_has_no_face {
                None
            } else {
                let p = req.out_dir.join("coeffs.mat");
                std::fs::write(&p, b"coeffs").unwrap();
                Some(p)
            };

            let cropped = req.out_dir.join("cropped.png");
            std::fs::write(&cropped, b"crop").unwrap();

            Ok(Extraction {
                coeff_path,
                cropped_image: cropped,
                crop_info: serde_json::json!([0, 0, 512, 512]),
            })
        }

        async fn audio_to_coeffs(&self, batch: CoeffBatch<'_>) -> PipelineResult<PathBuf> {
            *self.coeff_refs.lock().unwrap() = Some((
                batch.ref_eyeblink_coeff.map(Path::to_path_buf),
                batch.ref_pose_coeff.map(Path::to_path_buf),
            ));
            let p = batch.out_dir.join("audio_coeffs.mat");
            std::fs::write(&p, b"audio-coeffs").unwrap();
            Ok(p)
        }

        async fn render_face3d(
            &self,
            _paths: &ModelPaths,
            _device: Device,
            _first_coeff: &Path,
            _coeff_path: &Path,
            _audio: &Path,
            output: &Path,
        ) -> PipelineResult<()> {
            *self.face3d_calls.lock().unwrap() += 1;
            std::fs::write(output, b"vis").unwrap();
            Ok(())
        }

        async fn render(&self, batch: RenderBatch<'_>) -> PipelineResult<PathBuf> {
            let p = batch.out_dir.join("rendered.mp4");
            std::fs::write(&p, b"video").unwrap();
            Ok(p)
        }
    }

    #[derive(Default)]
    struct FakeStore {
        uploads: Mutex<Vec<(PathBuf, String, String)>>,
        fail: bool,
    }

    impl ObjectStore for FakeStore {
        async fn upload_public(
            &self,
            path: &Path,
            bucket: &str,
            object_name: &str,
            _content_type: &str,
        ) -> StorageResult<String> {
            if self.fail {
                return Err(StorageError::upload_failed("bucket unreachable"));
            }
            self.uploads.lock().unwrap().push((
                path.to_path_buf(),
                bucket.to_string(),
                object_name.to_string(),
            ));
            Ok(format!("https://storage.example.com/{bucket}/{object_name}"))
        }
    }

    fn generator(
        engine: FakeEngine,
        store: FakeStore,
        result_dir: &Path,
    ) -> VideoGenerator<FakeEngine, FakeStore> {
        VideoGenerator::new(engine, store, result_dir, "/app/SadTalker", "/app/SadTalker/src/config")
    }

    fn write_assets(dir: &Path) -> JobAssets {
        let image = dir.join("input_image.png");
        let audio = dir.join("input_audio.wav");
        std::fs::write(&image, b"img").unwrap();
        std::fs::write(&audio, b"wav").unwrap();
        JobAssets {
            source_image: image,
            driven_audio: audio,
            ref_eyeblink: None,
            ref_pose: None,
        }
    }

    #[tokio::test]
    async fn success_uploads_timestamped_object_and_removes_workdir() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let gen = generator(FakeEngine::default(), FakeStore::default(), &result_dir);
        let assets = write_assets(dir.path());

        let url = gen.generate(&assets, &test_params()).await.unwrap();

        let uploads = gen.store.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 1);
        let (_, bucket, object_name) = &uploads[0];
        assert_eq!(bucket, OUTPUT_BUCKET);
        assert!(object_name.ends_with(".mp4"));
        assert_eq!(url, format!("https://storage.example.com/{OUTPUT_BUCKET}/{object_name}"));

        // The working directory is gone; only the moved output remains.
        let entries: Vec<_> = std::fs::read_dir(&result_dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(entries, vec![object_name.clone()]);

        // Object name is the working-directory timestamp plus ".mp4".
        let stamp = object_name.strip_suffix(".mp4").unwrap();
        assert!(!result_dir.join(stamp).exists());
    }

    #[tokio::test]
    async fn source_extraction_failure_returns_error_without_upload() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let engine = FakeEngine {
            source_has_no_face: true,
            ..Default::default()
        };
        let gen = generator(engine, FakeStore::default(), &result_dir);
        let assets = write_assets(dir.path());

        let err = gen.generate(&assets, &test_params()).await.unwrap_err();
        assert!(matches!(err, WorkerError::ExtractionFailed(_)));
        assert!(gen.store.uploads.lock().unwrap().is_empty());

        // The working directory is leaked on failure.
        assert_eq!(std::fs::read_dir(&result_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn identical_pose_and_eyeblink_reference_extracted_once() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let gen = generator(FakeEngine::default(), FakeStore::default(), &result_dir);

        let mut assets = write_assets(dir.path());
        let reference = dir.path().join("eyeroll.mp4");
        std::fs::write(&reference, b"ref").unwrap();
        assets.ref_eyeblink = Some(reference.clone());
        assets.ref_pose = Some(reference.clone());

        gen.generate(&assets, &test_params()).await.unwrap();

        // Source image + one reference extraction, not two.
        let calls = gen.engine.extract_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (assets.source_image.clone(), true));
        assert_eq!(calls[1], (reference.clone(), false));

        // The pose coefficients are the eye-blink coefficients, verbatim.
        let refs = gen.engine.coeff_refs.lock().unwrap().clone().unwrap();
        assert!(refs.0.is_some());
        assert_eq!(refs.0, refs.1);
    }

    #[tokio::test]
    async fn distinct_references_extracted_separately() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let gen = generator(FakeEngine::default(), FakeStore::default(), &result_dir);

        let mut assets = write_assets(dir.path());
        let blink = dir.path().join("eyeroll.mp4");
        let pose = dir.path().join("ref_pose.mp4");
        std::fs::write(&blink, b"b").unwrap();
        std::fs::write(&pose, b"p").unwrap();
        assets.ref_eyeblink = Some(blink);
        assets.ref_pose = Some(pose);

        gen.generate(&assets, &test_params()).await.unwrap();

        let calls = gen.engine.extract_calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
    }

    #[tokio::test]
    async fn face3d_stage_runs_only_when_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let gen = generator(FakeEngine::default(), FakeStore::default(), &result_dir);
        let assets = write_assets(dir.path());

        gen.generate(&assets, &test_params()).await.unwrap();
        assert_eq!(*gen.engine.face3d_calls.lock().unwrap(), 0);

        let mut params = test_params();
        params.face3dvis = true;
        gen.generate(&assets, &params).await.unwrap();
        assert_eq!(*gen.engine.face3d_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn upload_failure_is_an_error_value() {
        let dir = tempfile::tempdir().unwrap();
        let result_dir = dir.path().join("results");
        let store = FakeStore {
            fail: true,
            ..Default::default()
        };
        let gen = generator(FakeEngine::default(), store, &result_dir);
        let assets = write_assets(dir.path());

        let err = gen.generate(&assets, &test_params()).await.unwrap_err();
        assert!(matches!(err, WorkerError::Storage(_)));
    }
}
