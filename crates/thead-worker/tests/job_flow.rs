//! End-to-end job handler flow against a local HTTP server and fake
//! pipeline/storage seams.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use thead_models::{Device, JobInput};
use thead_pipeline::{
    CoeffBatch, Extraction, ExtractionRequest, InferenceEngine, ModelPaths, PipelineResult,
    RenderBatch,
};
use thead_storage::{StorageError, StorageResult};
use thead_worker::{
    GenerationDefaults, ObjectStore, VideoGenerator, Worker, WorkerError, OUTPUT_BUCKET,
};

#[derive(Clone, Default)]
struct FakeEngine {
    /// (input path, source_image flag) per extract call
    extract_calls: Arc<Mutex<Vec<(PathBuf, bool)>>>,
    /// Device each coeff batch ran on
    devices: Arc<Mutex<Vec<Device>>>,
}

impl InferenceEngine for FakeEngine {
    async fn extract(&self, req: ExtractionRequest<'_>) -> PipelineResult<Extraction> {
        self.extract_calls
            .lock()
            .unwrap()
            .push((req.input.to_path_buf(), req.source_image));

        let coeff = req.out_dir.join("coeffs.mat");
        let cropped = req.out_dir.join("cropped.png");
        std::fs::write(&coeff, b"coeffs").unwrap();
        std::fs::write(&cropped, b"crop").unwrap();

        Ok(Extraction {
            coeff_path: Some(coeff),
            cropped_image: cropped,
            crop_info: serde_json::Value::Null,
        })
    }

    async fn audio_to_coeffs(&self, batch: CoeffBatch<'_>) -> PipelineResult<PathBuf> {
        self.devices.lock().unwrap().push(batch.device);
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
        std::fs::write(output, b"vis").unwrap();
        Ok(())
    }

    async fn render(&self, batch: RenderBatch<'_>) -> PipelineResult<PathBuf> {
        let p = batch.out_dir.join("rendered.mp4");
        std::fs::write(&p, b"video").unwrap();
        Ok(p)
    }
}

#[derive(Clone, Default)]
struct FakeStore {
    uploads: Arc<Mutex<Vec<(String, String)>>>,
}

impl ObjectStore for FakeStore {
    async fn upload_public(
        &self,
        _path: &Path,
        bucket: &str,
        object_name: &str,
        _content_type: &str,
    ) -> StorageResult<String> {
        if bucket != OUTPUT_BUCKET {
            return Err(StorageError::upload_failed("wrong bucket"));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), object_name.to_string()));
        Ok(format!("https://storage.example.com/{bucket}/{object_name}"))
    }
}

struct Fixture {
    worker: Worker<FakeEngine, FakeStore>,
    engine: FakeEngine,
    store: FakeStore,
    _dirs: (tempfile::TempDir, tempfile::TempDir),
}

fn fixture() -> Fixture {
    let work_dir = tempfile::tempdir().unwrap();
    let result_dir = tempfile::tempdir().unwrap();

    let engine = FakeEngine::default();
    let store = FakeStore::default();
    let generator = VideoGenerator::new(
        engine.clone(),
        store.clone(),
        result_dir.path().join("results"),
        "/app/SadTalker",
        "/app/SadTalker/src/config",
    );
    let worker = Worker::new(
        reqwest::Client::new(),
        generator,
        GenerationDefaults::default(),
        work_dir.path(),
    );

    Fixture {
        worker,
        engine,
        store,
        _dirs: (work_dir, result_dir),
    }
}

async fn serve_asset(server: &MockServer, route: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn missing_required_field_never_invokes_generation() {
    let f = fixture();

    let input = JobInput {
        input_audio_url: Some("https://example.com/speech.wav".to_string()),
        ..Default::default()
    };

    let err = f.worker.handle(&input).await.unwrap_err();
    assert!(matches!(err, WorkerError::MissingInput("input_image_url")));
    assert!(f.engine.extract_calls.lock().unwrap().is_empty());
    assert!(f.store.uploads.lock().unwrap().is_empty());
}

#[tokio::test]
async fn required_download_failure_fails_the_job() {
    let server = MockServer::start().await;
    serve_asset(&server, "/face.png", b"img").await;
    Mock::given(method("GET"))
        .and(path("/speech.wav"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let f = fixture();
    let input = JobInput {
        input_image_url: Some(format!("{}/face.png", server.uri())),
        input_audio_url: Some(format!("{}/speech.wav", server.uri())),
        ..Default::default()
    };

    let err = f.worker.handle(&input).await.unwrap_err();
    assert!(matches!(err, WorkerError::DownloadFailed { .. }));
    assert!(f.engine.extract_calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn successful_job_uploads_one_timestamped_object() {
    let server = MockServer::start().await;
    serve_asset(&server, "/face.png", b"img").await;
    serve_asset(&server, "/speech.wav", b"wav").await;

    let f = fixture();
    let input = JobInput {
        input_image_url: Some(format!("{}/face.png", server.uri())),
        input_audio_url: Some(format!("{}/speech.wav", server.uri())),
        device: Some("cpu".to_string()),
        ..Default::default()
    };

    let output = f.worker.handle(&input).await.unwrap();

    let uploads = f.store.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (bucket, object_name) = &uploads[0];
    assert_eq!(bucket, OUTPUT_BUCKET);
    assert!(object_name.ends_with(".mp4"));
    assert_eq!(
        output.output_video_url,
        format!("https://storage.example.com/{bucket}/{object_name}")
    );

    // Explicit cpu override reached the pipeline
    assert_eq!(*f.engine.devices.lock().unwrap(), vec![Device::Cpu]);
}

#[tokio::test]
async fn failed_optional_reference_download_is_dropped() {
    let server = MockServer::start().await;
    serve_asset(&server, "/face.png", b"img").await;
    serve_asset(&server, "/speech.wav", b"wav").await;
    Mock::given(method("GET"))
        .and(path("/blink.mp4"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let f = fixture();
    let input = JobInput {
        input_image_url: Some(format!("{}/face.png", server.uri())),
        input_audio_url: Some(format!("{}/speech.wav", server.uri())),
        ref_eyeblink_url: Some(format!("{}/blink.mp4", server.uri())),
        device: Some("cpu".to_string()),
        ..Default::default()
    };

    // Generation proceeds as though the reference were never supplied.
    f.worker.handle(&input).await.unwrap();

    let calls = f.engine.extract_calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].1, "only the source image was extracted");
}

#[tokio::test]
async fn shared_reference_url_is_downloaded_and_extracted_once() {
    let server = MockServer::start().await;
    serve_asset(&server, "/face.png", b"img").await;
    serve_asset(&server, "/speech.wav", b"wav").await;
    Mock::given(method("GET"))
        .and(path("/blink.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ref".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let f = fixture();
    let url = format!("{}/blink.mp4", server.uri());
    let input = JobInput {
        input_image_url: Some(format!("{}/face.png", server.uri())),
        input_audio_url: Some(format!("{}/speech.wav", server.uri())),
        ref_eyeblink_url: Some(url.clone()),
        ref_pose_url: Some(url),
        device: Some("cpu".to_string()),
        ..Default::default()
    };

    f.worker.handle(&input).await.unwrap();

    // Source image + the shared reference; no separate pose extraction.
    let calls = f.engine.extract_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
}
