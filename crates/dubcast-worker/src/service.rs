//! Dubbing entry points.
//!
//! [`DubbingService`] wires the stores, object storage and collaborators
//! together and exposes the three operations callers need: transcribing a
//! source upload, bootstrapping a target-language row, and running the full
//! translation job.

use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Instrument};

use dubcast_media::{BatchConcatenator, MediaError, ScratchArena};
use dubcast_models::{
    dubbed_media_name, JobIdentifier, NewTransformation, Transcript, Transformation,
    TransformationId, TransformationStatus, VoiceSelector,
};
use dubcast_providers::{ProviderError, Transcriber};
use dubcast_storage::{ObjectStore, StorageError};

use crate::config::WorkerConfig;
use crate::credits::CreditGuard;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::retry_async;
use crate::scheduler::{SegmentScheduler, StoreProgress};
use crate::segment::{Collaborators, SegmentJob, SegmentProcessor, SegmentSettings};
use crate::store::{CreditStore, TransformationStore};
use crate::transcript::clean_transcript;

/// Everything the service talks to.
#[derive(Clone)]
pub struct DubbingContext {
    pub config: WorkerConfig,
    pub transcriber: Arc<dyn Transcriber>,
    pub collaborators: Collaborators,
    pub objects: Arc<dyn ObjectStore>,
    pub transformations: Arc<dyn TransformationStore>,
    pub credits: Arc<dyn CreditStore>,
}

/// Parameters of one translation job.
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub source: TransformationId,
    pub target: TransformationId,
    /// Team charged for the job
    pub team_id: i64,
    pub identifier: JobIdentifier,
    /// Falls back to the worker's default when unset
    pub lip_sync: Option<bool>,
    pub voice: VoiceSelector,
}

pub struct DubbingService {
    ctx: DubbingContext,
}

impl DubbingService {
    pub fn new(ctx: DubbingContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DubbingContext {
        &self.ctx
    }

    /// Transcribe an uploaded media file and store it as a finished
    /// transformation.
    ///
    /// `target_language` defaults to the language the recognizer detected.
    pub async fn create_transformation(
        &self,
        project_id: i64,
        file_name: &str,
        is_source: bool,
        target_language: Option<&str>,
    ) -> WorkerResult<Transformation> {
        let link = self.storage_call("get_link", || self.ctx.objects.get_link(file_name)).await?;

        let transcriber = &self.ctx.transcriber;
        let raw = retry_async(
            &self.ctx.config.call_backoff(),
            "transcribe",
            ProviderError::is_retryable,
            || transcriber.transcribe(&link),
        )
        .await
        .into_result()
        .map_err(|e| WorkerError::TranscriptionFailed(e.to_string()))?;

        let transcript = clean_transcript(raw);
        let language = target_language
            .map(str::to_string)
            .unwrap_or_else(|| transcript.detected_language.clone());

        info!(
            project_id,
            file_name,
            segments = transcript.segments.len(),
            language = %language,
            "Transcribed media"
        );

        let row = self
            .ctx
            .transformations
            .create(NewTransformation {
                project_id,
                target_language: language,
                target_media: file_name.to_string(),
                transcript: Some(transcript),
                is_source,
                status: TransformationStatus::Complete,
                progress: 100.0,
            })
            .await?;
        Ok(row)
    }

    /// Return the project's transformation for `language`, creating an empty
    /// `starting` row when there is none yet.
    pub async fn create_target_transformation(
        &self,
        source: TransformationId,
        language: &str,
    ) -> WorkerResult<Transformation> {
        let source = self.ctx.transformations.get(source).await?;

        if let Some(existing) = self
            .ctx
            .transformations
            .find_by_project_language(source.project_id, language)
            .await?
        {
            return Ok(existing);
        }

        let identifier = JobIdentifier::generate(source.project_id, language, Utc::now());
        let row = self
            .ctx
            .transformations
            .create(NewTransformation::pending(
                source.project_id,
                language,
                dubbed_media_name(&identifier),
            ))
            .await?;
        Ok(row)
    }

    /// Run a full dubbing job into `job.target`.
    ///
    /// Credits are reserved before any work starts and restored if the job
    /// fails. The target row ends `complete` or `error`.
    pub async fn create_translation(&self, job: TranslationJob) -> WorkerResult<Transformation> {
        let store = &self.ctx.transformations;

        let source = store.get(job.source).await?;
        let target = store.get(job.target).await?;
        let logger = JobLogger::new(&job.identifier, &target.target_language);
        let transcript = source
            .transcript
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                WorkerError::invalid_input(format!("transformation {} has no transcript", source.id))
            })?;

        let guard = CreditGuard::new(self.ctx.credits.as_ref());
        let reservation = guard.reserve(job.team_id, &transcript).await?;

        logger.started(transcript.segments.len(), reservation.charged);

        let outcome = match store
            .update_status(target.id, TransformationStatus::Processing)
            .await
        {
            Ok(_) => {
                self.run_job(&job, &logger, &source, &target, &transcript)
                    .instrument(logger.span())
                    .await
            }
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(row) => {
                metrics::record_job_completed();
                logger.completed(&row.target_media);
                Ok(row)
            }
            Err(e) => {
                if let Err(status_err) = store.update_status(target.id, TransformationStatus::Error).await {
                    warn!(
                        transformation_id = %target.id,
                        error = %status_err,
                        "Failed to mark transformation as errored"
                    );
                }
                let refunded = match guard.refund(&reservation).await {
                    Ok(_) => true,
                    Err(refund_err) => {
                        error!(
                            team_id = job.team_id,
                            error = %refund_err,
                            "Failed to reimburse credits"
                        );
                        false
                    }
                };
                logger.failed(&e, refunded);
                metrics::record_job_failed();
                Err(e)
            }
        }
    }

    /// Owns the scratch arena for the job and removes it whatever the result.
    async fn run_job(
        &self,
        job: &TranslationJob,
        logger: &JobLogger,
        source: &Transformation,
        target: &Transformation,
        transcript: &Transcript,
    ) -> WorkerResult<Transformation> {
        let arena = Arc::new(ScratchArena::create(&self.ctx.config.work_dir, &job.identifier).await?);

        let result = self.dub(job, logger, &arena, source, target, transcript).await;

        match Arc::try_unwrap(arena) {
            Ok(arena) => {
                if let Err(e) = arena.cleanup().await {
                    warn!(identifier = %job.identifier, error = %e, "Failed to remove scratch arena");
                }
            }
            Err(_) => warn!(
                identifier = %job.identifier,
                "Scratch arena still referenced, leaving removal to drop"
            ),
        }

        result
    }

    async fn dub(
        &self,
        job: &TranslationJob,
        logger: &JobLogger,
        arena: &Arc<ScratchArena>,
        source: &Transformation,
        target: &Transformation,
        transcript: &Transcript,
    ) -> WorkerResult<Transformation> {
        let config = &self.ctx.config;
        let media = self.ctx.collaborators.media.clone();

        let source_path = arena.source_path();
        self.storage_call("download", || {
            self.ctx.objects.download(&source.target_media, &source_path)
        })
        .await?;
        let source_duration = self.media_call("probe_source", || media.duration(&source_path)).await?;

        let jobs = SegmentJob::plan_all(&transcript.segments, config.translation_context);
        let processor = Arc::new(SegmentProcessor::new(
            self.ctx.collaborators.clone(),
            arena.clone(),
            &source_path,
            SegmentSettings {
                target_language: target.target_language.clone(),
                voice: job.voice.clone(),
                lip_sync: job.lip_sync.unwrap_or(config.lip_sync_default),
                source_duration,
                gap_epsilon: config.gap_epsilon,
                tail_threshold: config.tail_threshold,
                call_backoff: config.call_backoff(),
            },
        ));
        let progress = Arc::new(StoreProgress::new(
            self.ctx.transformations.clone(),
            target.id,
        ));

        let outputs = SegmentScheduler::new(config.segment_parallelism, config.segment_backoff())
            .run(processor, jobs, progress)
            .await?;
        logger.segments_dubbed(outputs.len());

        let clips: Vec<PathBuf> = outputs.iter().map(|o| o.clip.clone()).collect();
        let merged = arena.output_path();
        BatchConcatenator::new(media.as_ref(), arena.batch_dir("final"))
            .with_batch_size(config.concat_batch_size)
            .consume_inputs(true)
            .concat(&clips, &merged)
            .await?;

        self.storage_call("upload", || self.ctx.objects.upload(&target.target_media, &merged))
            .await?;

        let translated = Transcript::new(
            target.target_language.to_lowercase(),
            outputs.into_iter().map(|o| o.segment).collect(),
        );

        match self.finalize(target.id, translated).await {
            Ok(row) => Ok(row),
            Err(e) => {
                match self.ctx.objects.delete(&target.target_media).await {
                    Ok(()) => logger.rolled_back(&target.target_media, &e),
                    Err(delete_err) => error!(
                        media = %target.target_media,
                        error = %delete_err,
                        "Failed to remove uploaded media"
                    ),
                }
                Err(e)
            }
        }
    }

    async fn finalize(
        &self,
        id: TransformationId,
        transcript: Transcript,
    ) -> WorkerResult<Transformation> {
        let store = &self.ctx.transformations;
        store.update_transcript(id, transcript).await?;
        store.update_progress(id, 100.0).await?;
        Ok(store.update_status(id, TransformationStatus::Complete).await?)
    }

    async fn storage_call<T, F, Fut>(&self, name: &str, op: F) -> WorkerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, StorageError>>,
    {
        Ok(retry_async(
            &self.ctx.config.call_backoff(),
            name,
            StorageError::is_retryable,
            op,
        )
        .await
        .into_result()?)
    }

    async fn media_call<T, F, Fut>(&self, name: &str, op: F) -> WorkerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, MediaError>>,
    {
        Ok(retry_async(
            &self.ctx.config.call_backoff(),
            name,
            MediaError::is_transient,
            op,
        )
        .await
        .into_result()?)
    }
}
