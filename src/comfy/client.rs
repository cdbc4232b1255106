use std::collections::HashMap;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::error::RenderError;
use super::prompt::PromptBuilder;
use super::types::{HistoryEntry, ImageRef, QueueRequest, QueueResponse, QueueStatus};
use super::workflow::{StageParams, WorkflowTemplate};
use super::ImageRenderer;
use crate::config::RenderConfig;
use crate::selector::Style;
use crate::state_machine::{JobSignal, RenderJob, StateMachine, Transition};

/// What a single poll of the server observed.
enum PollResult {
    Pending,
    Running,
    Finished(Vec<u8>),
    Failed(String),
}

/// Submits jobs to the render server and polls them to a terminal state.
pub struct RenderJobClient {
    client: Client,
    base_url: String,
    client_id: String,
    template: WorkflowTemplate,
    prompts: PromptBuilder,
    config: RenderConfig,
}

impl RenderJobClient {
    /// Build a client from configuration, loading the workflow template file
    /// when one is configured.
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let template = match &config.workflow_path {
            Some(path) => WorkflowTemplate::load(path)?,
            None => WorkflowTemplate::builtin(),
        };
        Ok(Self::with_template(config, template))
    }

    pub fn with_template(config: &RenderConfig, template: WorkflowTemplate) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.request_timeout())
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: config.base_url(),
            client_id: Uuid::new_v4().to_string(),
            template,
            prompts: PromptBuilder::new(&config.prompt_templates),
            config: config.clone(),
        }
    }

    /// Queue a job. `seed = None` draws a fresh random seed for this job.
    pub async fn submit(
        &self,
        prompt: &str,
        negative_prompt: &str,
        width: u32,
        height: u32,
        seed: Option<u64>,
    ) -> Result<RenderJob, RenderError> {
        let resolved_seed = seed.unwrap_or_else(random_seed);
        let spec = self.template.render(&StageParams {
            prompt,
            negative_prompt,
            width,
            height,
            steps: self.config.steps,
            cfg_scale: self.config.cfg_scale,
            sampler: &self.config.sampler,
            scheduler: &self.config.scheduler,
            seed: resolved_seed,
            checkpoint: &self.config.checkpoint,
            filename_prefix: &self.config.filename_prefix,
        })?;

        let body = QueueRequest {
            prompt: spec,
            client_id: self.client_id.clone(),
        };

        let response = self
            .client
            .post(format!("{}/prompt", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| RenderError::Submission(format!("server unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RenderError::Submission(format!(
                "server returned status {}: {}",
                status.as_u16(),
                message.trim()
            )));
        }

        let queued: QueueResponse = response
            .json()
            .await
            .map_err(|e| RenderError::Submission(format!("unreadable queue response: {e}")))?;

        let job_id = queued
            .prompt_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| RenderError::Submission("response has no job identifier".into()))?;

        debug!(job_id = %job_id, seed = resolved_seed, "job queued");
        Ok(RenderJob::new(
            job_id,
            prompt.to_string(),
            negative_prompt.to_string(),
            width,
            height,
            resolved_seed,
        ))
    }

    /// Poll until the job completes, fails, or `timeout` elapses.
    ///
    /// Poll errors are logged and retried on the next tick. A timeout only
    /// abandons the job locally; nothing is cancelled on the server.
    pub async fn await_result(
        &self,
        job: &mut RenderJob,
        timeout: Duration,
    ) -> Result<Vec<u8>, RenderError> {
        let started = Instant::now();
        let interval = self.config.poll_interval();

        loop {
            let signal = match self.poll_once(&job.id).await {
                Ok(PollResult::Finished(bytes)) => {
                    StateMachine::next(job, JobSignal::Finished);
                    info!(job_id = %job.id, bytes = bytes.len(), "job completed");
                    return Ok(bytes);
                }
                Ok(PollResult::Failed(message)) => {
                    StateMachine::next(job, JobSignal::Failed);
                    return Err(RenderError::GenerationFailed {
                        job_id: job.id.clone(),
                        message,
                    });
                }
                Ok(PollResult::Running) => JobSignal::Running,
                Ok(PollResult::Pending) => JobSignal::Pending,
                Err(e) => {
                    warn!(job_id = %job.id, "status check failed, retrying: {e}");
                    JobSignal::Pending
                }
            };

            if let Transition::Next(state) = StateMachine::next(job, signal) {
                debug!(job_id = %job.id, state = %state, "job state changed");
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                StateMachine::next(job, JobSignal::Deadline);
                return Err(RenderError::GenerationTimedOut {
                    job_id: job.id.clone(),
                    waited: elapsed,
                });
            }
            sleep(interval.min(timeout - elapsed)).await;
        }
    }

    async fn poll_once(&self, job_id: &str) -> Result<PollResult, reqwest::Error> {
        let response = self
            .client
            .get(format!("{}/history/{job_id}", self.base_url))
            .send()
            .await?;

        if response.status().is_success() {
            let mut history: HashMap<String, HistoryEntry> = response.json().await?;
            if let Some(entry) = history.remove(job_id) {
                return Ok(self.evaluate_entry(job_id, &entry).await);
            }
        }

        if self.is_running(job_id).await {
            Ok(PollResult::Running)
        } else {
            Ok(PollResult::Pending)
        }
    }

    async fn evaluate_entry(&self, job_id: &str, entry: &HistoryEntry) -> PollResult {
        if let Some(message) = entry.failure_message() {
            return PollResult::Failed(message);
        }

        let refs = entry.image_refs();
        if refs.is_empty() {
            return if entry.is_completed() {
                PollResult::Failed("job finished without output images".into())
            } else {
                PollResult::Running
            };
        }

        for image in refs {
            match self.download(image).await {
                Ok(bytes) => return PollResult::Finished(bytes),
                Err(e) => warn!(job_id, filename = %image.filename, "image download failed: {e}"),
            }
        }

        // Outputs exist but none could be fetched yet; try again next tick.
        PollResult::Running
    }

    async fn is_running(&self, job_id: &str) -> bool {
        let response = match self
            .client
            .get(format!("{}/queue", self.base_url))
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            _ => return false,
        };

        response
            .json::<QueueStatus>()
            .await
            .map(|queue| queue.is_running(job_id))
            .unwrap_or(false)
    }

    async fn download(&self, image: &ImageRef) -> Result<Vec<u8>, reqwest::Error> {
        let mut query = vec![("filename", image.filename.as_str())];
        if !image.subfolder.is_empty() {
            query.push(("subfolder", image.subfolder.as_str()));
        }
        if !image.kind.is_empty() {
            query.push(("type", image.kind.as_str()));
        }

        let bytes = self
            .client
            .get(format!("{}/view", self.base_url))
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}

impl ImageRenderer for RenderJobClient {
    async fn generate(&self, headline: &str, style: Style) -> Result<Vec<u8>, RenderError> {
        let prompt = self.prompts.build(headline, style);
        let mut job = self
            .submit(
                &prompt,
                &self.config.negative_prompt,
                self.config.width,
                self.config.height,
                self.config.fixed_seed(),
            )
            .await?;

        info!(job_id = %job.id, style = %style, "render job submitted");
        self.await_result(&mut job, self.config.timeout()).await
    }
}

fn random_seed() -> u64 {
    u64::from(rand::random::<u32>().max(1))
}
