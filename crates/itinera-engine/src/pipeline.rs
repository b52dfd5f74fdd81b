//! Generation pipeline: the job state machine.
//!
//! `queued → fetching → analyzing → synthesizing → completed`, with
//! `failed` reachable from every non-terminal state. Progress is published
//! to the store at each milestone and proportionally while the batch runs;
//! it never moves backwards. Terminal jobs are immutable except through
//! explicit deletion.

use std::sync::Arc;

use tracing::{info, warn};
use validator::Validate;

use itinera_models::{
    FetchResult, GenerationJob, JobId, JobStatus, PerVideoResult, Transcript, TranscriptAnalysis,
    TravelPreferences, VideoReference,
};
use itinera_store::{JobFields, JobStore};

use crate::batch::BatchCoordinator;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::fetch::FetchOrchestrator;
use crate::logging::JobLogger;
use crate::retry::{retry_async, RetryConfig};
use crate::synth::{SynthesisError, Synthesizer};

/// Progress anchors for each stage.
const PROGRESS_FETCHING: u8 = 10;
const PROGRESS_ANALYZING: u8 = 40;
const PROGRESS_SYNTHESIZING: u8 = 50;
const PROGRESS_FINALIZING: u8 = 90;
const PROGRESS_DONE: u8 = 100;

/// Lightweight polling view of a job.
#[derive(Debug, Clone)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub message: String,
    pub per_video_results: Vec<PerVideoResult>,
    pub itinerary: Option<itinera_models::Itinerary>,
}

impl From<GenerationJob> for JobSnapshot {
    fn from(job: GenerationJob) -> Self {
        Self {
            job_id: job.job_id,
            status: job.status,
            progress_percent: job.progress_percent,
            message: job.message,
            per_video_results: job.per_video_results,
            itinerary: job.itinerary,
        }
    }
}

/// Orchestrates one itinerary generation from submission to completion.
pub struct GenerationPipeline {
    store: Arc<dyn JobStore>,
    batch: BatchCoordinator,
    synthesizer: Arc<dyn Synthesizer>,
    config: EngineConfig,
}

impl GenerationPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        orchestrator: Arc<FetchOrchestrator>,
        synthesizer: Arc<dyn Synthesizer>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            batch: BatchCoordinator::new(orchestrator),
            synthesizer,
            config,
        }
    }

    /// Validate a submission and persist a queued job.
    ///
    /// Resolution is all-or-nothing: one bad URL rejects the submission
    /// before any job record exists.
    pub async fn submit(
        &self,
        urls: &[String],
        preferences: TravelPreferences,
    ) -> EngineResult<JobId> {
        if urls.is_empty() {
            return Err(EngineError::invalid_submission("no video URLs given"));
        }
        if urls.len() > self.config.max_batch_size {
            return Err(EngineError::invalid_submission(format!(
                "at most {} videos per request, got {}",
                self.config.max_batch_size,
                urls.len()
            )));
        }
        preferences
            .validate()
            .map_err(|e| EngineError::invalid_submission(format!("preferences invalid: {e}")))?;

        let references = urls
            .iter()
            .map(|url| itinera_models::resolve(url))
            .collect::<Result<Vec<VideoReference>, _>>()?;

        let job = GenerationJob::new(references, preferences);
        let job_id = job.job_id.clone();
        self.store.create_job(&job).await?;
        info!(job_id = %job_id, videos = job.references.len(), "Job submitted");
        metrics::counter!("jobs_submitted_total").increment(1);
        Ok(job_id)
    }

    /// Submit and start the pipeline on a background task.
    pub async fn submit_and_spawn(
        self: &Arc<Self>,
        urls: &[String],
        preferences: TravelPreferences,
    ) -> EngineResult<JobId> {
        let job_id = self.submit(urls, preferences).await?;
        let pipeline = Arc::clone(self);
        let spawned_id = job_id.clone();
        tokio::spawn(async move {
            if let Err(e) = pipeline.run(&spawned_id).await {
                warn!(job_id = %spawned_id, error = %e, "Pipeline run failed");
            }
        });
        Ok(job_id)
    }

    /// Current state of a job.
    pub async fn poll(&self, job_id: &JobId) -> EngineResult<JobSnapshot> {
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;
        Ok(job.into())
    }

    /// Delete a job record, terminal or not. Deleting a missing job is a
    /// no-op.
    pub async fn delete(&self, job_id: &JobId) -> EngineResult<()> {
        self.store.delete_job(job_id).await?;
        info!(job_id = %job_id, "Job deleted");
        Ok(())
    }

    /// Run the pipeline for a previously submitted job.
    ///
    /// Rerunning a terminal job fails with `JobAlreadyTerminal` and leaves
    /// the record untouched.
    pub async fn run(&self, job_id: &JobId) -> EngineResult<()> {
        let logger = JobLogger::new(job_id, "itinerary_generation");
        let job = self
            .store
            .get_job(job_id)
            .await?
            .ok_or_else(|| EngineError::JobNotFound(job_id.to_string()))?;
        if job.is_terminal() {
            logger.log_warning("Rerun requested for a terminal job");
            return Err(EngineError::JobAlreadyTerminal(job_id.to_string()));
        }

        logger.log_start(&format!("{} video(s)", job.references.len()));
        match self.run_stages(&logger, &job).await {
            Ok(()) => {
                metrics::counter!("jobs_completed_total").increment(1);
                Ok(())
            }
            Err(e) => {
                metrics::counter!("jobs_failed_total").increment(1);
                logger.log_error(&e.to_string());
                self.fail(job_id, &e).await?;
                Err(e)
            }
        }
    }

    async fn run_stages(&self, logger: &JobLogger, job: &GenerationJob) -> EngineResult<()> {
        let job_id = &job.job_id;

        // Fetching: 10 -> 40, proportional to finished videos.
        self.transition(job_id, JobStatus::Fetching, PROGRESS_FETCHING, "Fetching video content")
            .await?;
        let results = self.fetch_stage(logger, job).await?;

        let per_video: Vec<PerVideoResult> = results
            .iter()
            .map(|result| PerVideoResult {
                canonical_id: result.reference.canonical_id.clone(),
                raw_url: result.reference.raw_url.clone(),
                usable: result.is_usable(),
                title: result.title().map(str::to_string),
                error_detail: result.error_detail.clone(),
            })
            .collect();
        self.store
            .update_job(job_id, JobFields::new().per_video_results(per_video))
            .await?;

        let usable: Vec<&FetchResult> = results.iter().filter(|r| r.is_usable()).collect();
        if usable.is_empty() {
            return Err(EngineError::no_usable_content(format!(
                "0 of {} videos yielded a transcript",
                results.len()
            )));
        }
        if usable.len() < results.len() {
            logger.log_warning(&format!(
                "{} of {} videos unusable, continuing with the rest",
                results.len() - usable.len(),
                results.len()
            ));
        }

        // Analyzing: aggregate usable content for the synthesizer.
        self.transition(job_id, JobStatus::Analyzing, PROGRESS_ANALYZING, "Analyzing video content")
            .await?;
        let analysis = build_analysis(&usable);

        // Synthesizing: bounded retries on transient provider failures.
        self.transition(
            job_id,
            JobStatus::Synthesizing,
            PROGRESS_SYNTHESIZING,
            "Generating your itinerary",
        )
        .await?;
        let retry = RetryConfig::new("synthesis")
            .with_max_retries(self.config.synthesis_retries)
            .with_base_delay(std::time::Duration::from_secs(1));
        let itinerary = retry_async(
            &retry,
            |e: &SynthesisError| e.is_retryable(),
            || self.synthesizer.synthesize(&analysis, &job.preferences),
        )
        .await
        .map_err(|e| EngineError::synthesis(e.to_string()))?;

        // Finalizing.
        self.transition(
            job_id,
            JobStatus::Synthesizing,
            PROGRESS_FINALIZING,
            "Finalizing itinerary",
        )
        .await?;
        self.store
            .update_job(
                job_id,
                JobFields::new()
                    .status(JobStatus::Completed)
                    .progress(PROGRESS_DONE)
                    .message("Itinerary ready")
                    .itinerary(itinerary),
            )
            .await?;
        logger.log_completion("Itinerary generated");
        Ok(())
    }

    /// Run the batch, publishing proportional progress as videos finish.
    async fn fetch_stage(
        &self,
        logger: &JobLogger,
        job: &GenerationJob,
    ) -> EngineResult<Vec<FetchResult>> {
        let total = job.references.len();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<usize>();

        let store = Arc::clone(&self.store);
        let progress_job_id = job.job_id.clone();
        let progress_task = tokio::spawn(async move {
            while let Some(done) = rx.recv().await {
                let span = PROGRESS_ANALYZING - PROGRESS_FETCHING;
                let progress =
                    PROGRESS_FETCHING + ((done as f64 / total as f64) * span as f64) as u8;
                let fields = JobFields::new()
                    .progress(progress)
                    .message(format!("Fetched {done} of {total} video(s)"));
                if let Err(e) = store.update_job(&progress_job_id, fields).await {
                    warn!(job_id = %progress_job_id, error = %e, "Progress update failed");
                }
            }
        });

        let results = self
            .batch
            .process_batch(&job.references, |done, result| {
                if !result.is_usable() {
                    logger.log_warning(&format!(
                        "Video {} unusable: {}",
                        result.reference.canonical_id,
                        result.error_detail.as_deref().unwrap_or("unknown")
                    ));
                }
                let _ = tx.send(done);
            })
            .await;

        drop(tx);
        let _ = progress_task.await;
        Ok(results)
    }

    async fn transition(
        &self,
        job_id: &JobId,
        status: JobStatus,
        progress: u8,
        message: &str,
    ) -> EngineResult<()> {
        self.store
            .update_job(
                job_id,
                JobFields::new()
                    .status(status)
                    .progress(progress)
                    .message(message),
            )
            .await?;
        Ok(())
    }

    /// Move a job to `failed` with a human-readable message.
    async fn fail(&self, job_id: &JobId, error: &EngineError) -> EngineResult<()> {
        self.store
            .update_job(
                job_id,
                JobFields::new()
                    .status(JobStatus::Failed)
                    .message(error.user_message()),
            )
            .await?;
        Ok(())
    }
}

/// Aggregate usable fetch results into the synthesizer input.
fn build_analysis(usable: &[&FetchResult]) -> TranscriptAnalysis {
    let mut analysis = TranscriptAnalysis::default();
    for result in usable {
        let Some(payload) = result.payload.as_ref() else {
            continue;
        };
        let title = result
            .title()
            .map(str::to_string)
            .unwrap_or_else(|| format!("video {}", result.reference.canonical_id));
        analysis.video_titles.push(title);
        analysis
            .transcripts
            .push(format_transcript(&payload.transcript));
    }
    analysis
}

/// Render a transcript with coarse timestamps so the synthesizer can keep
/// chronological context.
fn format_transcript(transcript: &Transcript) -> String {
    transcript
        .segments
        .iter()
        .map(|s| format!("[{:.0}s] {}", s.start, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}
