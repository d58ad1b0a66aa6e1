//! Per-segment dubbing.
//!
//! A segment goes through translate, synthesize, extract, stretch, mux,
//! optional lip-sync and gap-fill. Every collaborator call is retried on its
//! own; the scheduler retries the segment as a whole on top of that.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use dubcast_media::{ClipStage, MediaEngine, MediaError, ScratchArena, StretchPlan};
use dubcast_models::{Segment, VoiceSelector};
use dubcast_providers::{
    LipSyncer, ProviderError, SpeechSynthesizer, TranslationRequest, Translator,
};

use crate::error::{WorkerError, WorkerResult};
use crate::gap_fill::{GapFiller, GapPlan};
use crate::metrics;
use crate::retry::{retry_async, BackoffPolicy};

/// One unit of work for the scheduler.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    /// Position in the cleaned transcript
    pub index: usize,
    pub segment: Segment,
    /// End of the preceding segment, `None` for the first
    pub previous_end: Option<f64>,
    pub is_last: bool,
    pub context_before: Vec<String>,
    pub context_after: Vec<String>,
}

impl SegmentJob {
    /// Build jobs for every segment, attaching up to `context` neighbouring
    /// lines on each side.
    pub fn plan_all(segments: &[Segment], context: usize) -> Vec<SegmentJob> {
        let count = segments.len();
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                let before_start = index.saturating_sub(context);
                let after_end = (index + 1 + context).min(count);
                SegmentJob {
                    index,
                    segment: segment.clone(),
                    previous_end: index.checked_sub(1).map(|prev| segments[prev].end),
                    is_last: index + 1 == count,
                    context_before: segments[before_start..index]
                        .iter()
                        .map(|s| s.text.clone())
                        .collect(),
                    context_after: segments[index + 1..after_end]
                        .iter()
                        .map(|s| s.text.clone())
                        .collect(),
                }
            })
            .collect()
    }
}

/// Result of a processed segment.
#[derive(Debug, Clone)]
pub struct SegmentOutput {
    /// Source timing with the translated text
    pub segment: Segment,
    /// Final clip, ready for concatenation
    pub clip: PathBuf,
    /// Expected clip duration: stretched target plus filled gaps
    pub duration: f64,
}

/// Anything the scheduler can run per segment.
#[async_trait]
pub trait SegmentTask: Send + Sync {
    async fn process(&self, job: &SegmentJob) -> WorkerResult<SegmentOutput>;
}

/// Collaborators a segment needs.
#[derive(Clone)]
pub struct Collaborators {
    pub translator: Arc<dyn Translator>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    pub lip_syncer: Option<Arc<dyn LipSyncer>>,
    pub media: Arc<dyn MediaEngine>,
}

/// Per-job segment settings.
#[derive(Debug, Clone)]
pub struct SegmentSettings {
    pub target_language: String,
    pub voice: VoiceSelector,
    pub lip_sync: bool,
    pub source_duration: f64,
    pub gap_epsilon: f64,
    pub tail_threshold: f64,
    pub call_backoff: BackoffPolicy,
}

/// Dubs one segment of one job's source media.
pub struct SegmentProcessor {
    collaborators: Collaborators,
    arena: Arc<ScratchArena>,
    source: PathBuf,
    settings: SegmentSettings,
}

impl SegmentProcessor {
    pub fn new(
        collaborators: Collaborators,
        arena: Arc<ScratchArena>,
        source: impl AsRef<Path>,
        settings: SegmentSettings,
    ) -> Self {
        Self {
            collaborators,
            arena,
            source: source.as_ref().to_path_buf(),
            settings,
        }
    }

    async fn translate(&self, job: &SegmentJob) -> WorkerResult<String> {
        let request = TranslationRequest::new(&job.segment.text, &self.settings.target_language)
            .with_context(job.context_before.clone(), job.context_after.clone());
        let translator = &self.collaborators.translator;

        let text = retry_async(
            &self.settings.call_backoff,
            "translate",
            ProviderError::is_retryable,
            || translator.translate(&request),
        )
        .await
        .into_result()?;

        let text = text.trim();
        if text.is_empty() {
            return Err(WorkerError::translation_failed(format!(
                "empty translation for segment {}",
                job.segment.id
            )));
        }
        Ok(text.to_string())
    }

    async fn synthesize(&self, segment_id: u32, text: &str) -> WorkerResult<PathBuf> {
        let synthesizer = &self.collaborators.synthesizer;
        let audio = retry_async(
            &self.settings.call_backoff,
            "synthesize",
            ProviderError::is_retryable,
            || synthesizer.synthesize(text, &self.settings.target_language, &self.settings.voice),
        )
        .await
        .into_result()?;

        if audio.is_empty() {
            return Err(WorkerError::synthesis_failed(format!(
                "no audio returned for segment {}",
                segment_id
            )));
        }

        let path = self.arena.clip_path(segment_id, ClipStage::Speech);
        tokio::fs::write(&path, &audio).await?;
        Ok(path)
    }

    /// Retry a media operation on transient FFmpeg failures.
    async fn media_call<T, F, Fut>(&self, name: &str, op: F) -> WorkerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, MediaError>>,
    {
        Ok(retry_async(
            &self.settings.call_backoff,
            name,
            MediaError::is_transient,
            op,
        )
        .await
        .into_result()?)
    }

    /// Returns the lip-synced clip, or `dubbed` when lip-sync is off or fails.
    async fn lip_sync(&self, segment_id: u32, dubbed: PathBuf) -> WorkerResult<PathBuf> {
        let syncer = match (&self.collaborators.lip_syncer, self.settings.lip_sync) {
            (Some(syncer), true) => syncer,
            _ => return Ok(dubbed),
        };

        let synced = self.arena.clip_path(segment_id, ClipStage::Synced);
        let result = retry_async(
            &self.settings.call_backoff,
            "lip_sync",
            ProviderError::is_retryable,
            || syncer.sync(&dubbed, &synced),
        )
        .await
        .into_result();

        match result {
            Ok(()) => Ok(synced),
            Err(e) => {
                warn!(
                    segment_id,
                    error = %e,
                    "Lip-sync failed, keeping dubbed clip"
                );
                metrics::record_lip_sync_fallback();
                tokio::fs::copy(&dubbed, &synced).await?;
                Ok(synced)
            }
        }
    }
}

#[async_trait]
impl SegmentTask for SegmentProcessor {
    async fn process(&self, job: &SegmentJob) -> WorkerResult<SegmentOutput> {
        let started = Instant::now();
        let segment = &job.segment;
        let id = segment.id;
        let media = self.collaborators.media.as_ref();

        let translated = self.translate(job).await?;
        debug!(segment_id = id, "Translated segment");

        let original = self.arena.clip_path(id, ClipStage::Original);
        self.media_call("extract", || {
            media.extract(&self.source, segment.start, segment.end, &original)
        })
        .await?;

        let speech = self.synthesize(id, &translated).await?;
        let audio_duration = self.media_call("probe", || media.duration(&speech)).await?;

        let plan = StretchPlan::compute(segment.duration(), audio_duration)?;
        debug!(
            segment_id = id,
            video_ratio = plan.video_ratio,
            audio_tempo = plan.audio_tempo,
            target = plan.target_duration,
            stretched_audio = plan.stretched_audio_duration(),
            "Timing reconciled"
        );

        let video = if plan.stretches_video() {
            let stretched_video = self.arena.clip_path(id, ClipStage::StretchedVideo);
            self.media_call("stretch_video", || {
                media.stretch_video(&original, plan.video_ratio, &stretched_video)
            })
            .await?;
            stretched_video
        } else {
            original
        };

        let audio = if plan.stretches_audio() {
            let stretched_audio = self.arena.clip_path(id, ClipStage::StretchedAudio);
            self.media_call("stretch_audio", || {
                media.stretch_audio(&speech, plan.audio_tempo, &stretched_audio)
            })
            .await?;
            stretched_audio
        } else {
            speech
        };

        let dubbed = self.arena.clip_path(id, ClipStage::Dubbed);
        self.media_call("mux", || {
            media.mux(&video, &audio, plan.target_duration, &dubbed)
        })
        .await?;

        let synced = self.lip_sync(id, dubbed).await?;

        let gaps = GapPlan::compute(
            job.previous_end,
            segment,
            job.is_last,
            self.settings.source_duration,
            self.settings.gap_epsilon,
            self.settings.tail_threshold,
        );
        let clip = GapFiller::new(media, &self.arena, &self.source)
            .apply(id, &gaps, synced)
            .await?;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_segment_processed(elapsed);
        info!(
            segment_id = id,
            elapsed_secs = elapsed,
            "Segment dubbed"
        );

        Ok(SegmentOutput {
            segment: Segment {
                words: Vec::new(),
                ..segment.with_text(translated)
            },
            clip,
            duration: plan.target_duration + gaps.added_duration(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segments() -> Vec<Segment> {
        vec![
            Segment::new(0, 0.5, 1.0, "a"),
            Segment::new(1, 1.5, 2.0, "b"),
            Segment::new(2, 2.5, 3.0, "c"),
            Segment::new(3, 3.5, 4.0, "d"),
        ]
    }

    #[test]
    fn test_plan_all_context_window() {
        let jobs = SegmentJob::plan_all(&segments(), 2);
        assert_eq!(jobs.len(), 4);

        assert!(jobs[0].context_before.is_empty());
        assert_eq!(jobs[0].context_after, vec!["b", "c"]);
        assert_eq!(jobs[2].context_before, vec!["a", "b"]);
        assert_eq!(jobs[2].context_after, vec!["d"]);
        assert!(jobs[3].context_after.is_empty());
    }

    #[test]
    fn test_plan_all_previous_end_and_last() {
        let jobs = SegmentJob::plan_all(&segments(), 0);
        assert_eq!(jobs[0].previous_end, None);
        assert_eq!(jobs[1].previous_end, Some(1.0));
        assert_eq!(jobs[3].previous_end, Some(3.0));
        assert!(jobs[3].is_last);
        assert!(!jobs[2].is_last);
        assert!(jobs.iter().all(|j| j.context_before.is_empty()));
    }

    #[test]
    fn test_plan_all_empty() {
        assert!(SegmentJob::plan_all(&[], 2).is_empty());
    }
}
