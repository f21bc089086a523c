//! Talking-head video generation worker binary.

use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use thead_pipeline::ModelCli;
use thead_storage::S3Client;
use thead_worker::{
    runtime, startup, GenerationDefaults, JobPoller, RuntimeConfig, VideoGenerator, Worker,
    WorkerConfig,
};

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("thead_worker=info".parse().unwrap())
        .add_directive("thead_pipeline=info".parse().unwrap())
        .add_directive("thead_storage=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting thead-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    let http = reqwest::Client::new();

    // Link checkpoint directories to the network volume, if one is mounted
    if let Err(e) = startup::ensure_volume_links(&config.model_root).await {
        warn!("Could not map network volume: {}", e);
    }

    // Populate any missing model checkpoints before accepting jobs
    if let Err(e) = startup::sync_checkpoints(&http, &config.model_root).await {
        error!("Failed to download checkpoints: {}", e);
        std::process::exit(1);
    }

    let store = match S3Client::from_env() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to configure object storage: {}", e);
            std::process::exit(1);
        }
    };

    let runtime_config = match RuntimeConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to configure serverless runtime: {}", e);
            std::process::exit(1);
        }
    };

    let engine = ModelCli::from_env();
    let generator = VideoGenerator::new(
        engine,
        store,
        config.result_dir.clone(),
        config.model_root.clone(),
        config.config_dir.clone(),
    );
    let worker = Worker::new(
        http.clone(),
        generator,
        GenerationDefaults::from_env(),
        config.work_dir.clone(),
    );
    let poller = JobPoller::new(http, runtime_config);

    if let Err(e) = runtime::serve(&poller, &worker).await {
        error!("Worker failed: {}", e);
        std::process::exit(1);
    }

    info!("Worker shutdown complete");
}
