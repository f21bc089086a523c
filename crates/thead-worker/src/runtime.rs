//! Serverless runtime poll loop.
//!
//! The worker long-polls the runtime's job-take endpoint, processes one job
//! at a time, and posts the output back. Any handler error is fatal to the
//! process: the runtime restarts the container, which re-runs the startup
//! sequence.

use std::time::Duration;

use tracing::{error, info, warn};
use uuid::Uuid;

use thead_models::{JobOutput, JobRequest};
use thead_pipeline::InferenceEngine;

use crate::error::{WorkerError, WorkerResult};
use crate::generator::ObjectStore;
use crate::handler::Worker;

/// Serverless runtime API configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Base URL of the runtime's worker API
    pub api_base: String,
    /// This worker's identity with the runtime
    pub worker_id: String,
    /// Bearer token, if the runtime requires one
    pub api_key: Option<String>,
    /// Delay between polls that returned no job
    pub poll_interval: Duration,
    /// Backoff after a runtime API error
    pub error_backoff: Duration,
}

impl RuntimeConfig {
    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Ok(Self {
            api_base: std::env::var("RUNTIME_API_BASE")
                .map_err(|_| WorkerError::runtime("RUNTIME_API_BASE not set"))?,
            worker_id: std::env::var("RUNTIME_WORKER_ID")
                .unwrap_or_else(|_| format!("worker-{}", Uuid::new_v4())),
            api_key: std::env::var("RUNTIME_API_KEY").ok(),
            poll_interval: Duration::from_millis(
                std::env::var("RUNTIME_POLL_INTERVAL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(1000),
            ),
            error_backoff: Duration::from_millis(
                std::env::var("RUNTIME_ERROR_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(5000),
            ),
        })
    }
}

/// Client for the runtime's job-take/job-done endpoints.
pub struct JobPoller {
    http: reqwest::Client,
    config: RuntimeConfig,
}

impl JobPoller {
    pub fn new(http: reqwest::Client, config: RuntimeConfig) -> Self {
        Self { http, config }
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Poll for the next job; `None` when the queue is empty.
    pub async fn take_job(&self) -> WorkerResult<Option<JobRequest>> {
        let url = format!(
            "{}/job-take/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.worker_id
        );

        let response = self.authorize(self.http.get(&url)).send().await?;

        match response.status() {
            s if s == reqwest::StatusCode::NO_CONTENT => Ok(None),
            s if s.is_success() => Ok(Some(response.json().await?)),
            s => Err(WorkerError::runtime(format!(
                "job-take returned HTTP {s}"
            ))),
        }
    }

    /// Report a completed job's output to the runtime.
    pub async fn complete_job(&self, job_id: &str, output: &JobOutput) -> WorkerResult<()> {
        let url = format!(
            "{}/job-done/{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.worker_id,
            job_id
        );

        let response = self
            .authorize(self.http.post(&url))
            .json(output)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(WorkerError::runtime(format!(
                "job-done returned HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Serve jobs until shutdown. Returns `Err` on the first failed job, which
/// the binary maps to a non-zero exit.
pub async fn serve<E: InferenceEngine, S: ObjectStore>(
    poller: &JobPoller,
    worker: &Worker<E, S>,
) -> WorkerResult<()> {
    info!(
        "Serving jobs as {} from {}",
        poller.config.worker_id, poller.config.api_base
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal");
                return Ok(());
            }
            polled = poller.take_job() => match polled {
                Ok(Some(job)) => {
                    info!(job_id = %job.id, "Processing job");
                    match worker.handle(&job.input).await {
                        Ok(output) => {
                            info!(job_id = %job.id, url = %output.output_video_url, "Job completed");
                            poller.complete_job(&job.id, &output).await?;
                        }
                        Err(e) => {
                            error!(job_id = %job.id, "Job failed: {}", e);
                            return Err(e);
                        }
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(poller.config.poll_interval).await;
                }
                Err(e) => {
                    warn!("Failed to poll for jobs: {}", e);
                    tokio::time::sleep(poller.config.error_backoff).await;
                }
            }
        }
    }
}
