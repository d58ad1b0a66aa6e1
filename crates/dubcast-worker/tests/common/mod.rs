//! Fakes for exercising the pipeline without FFmpeg or network access.
//!
//! Media files are small JSON documents holding a duration and the list of
//! source ranges they contain, so concatenation order and timing can be
//! checked on the final output.

#![allow(dead_code)]

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dubcast_media::{MediaEngine, MediaError, MediaResult};
use dubcast_models::{Segment, Transcript, VoiceSelector};
use dubcast_providers::{
    LipSyncer, ProviderError, ProviderResult, SpeechSynthesizer, Transcriber, TranslationRequest,
    Translator,
};
use dubcast_storage::{ObjectStore, StorageError, StorageResult};
use dubcast_worker::{
    Collaborators, DubbingContext, DubbingService, InMemoryStore, WorkerConfig,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FakeClip {
    pub duration: f64,
    pub parts: Vec<String>,
}

impl FakeClip {
    pub fn new(duration: f64, part: impl Into<String>) -> Self {
        Self {
            duration,
            parts: vec![part.into()],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap()
    }

    pub fn read_bytes(bytes: &[u8]) -> Self {
        serde_json::from_slice(bytes).unwrap()
    }

    pub async fn read(path: &Path) -> MediaResult<Self> {
        let raw = tokio::fs::read(path)
            .await
            .map_err(|_| MediaError::FileNotFound(path.to_path_buf()))?;
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn write(&self, path: &Path) -> MediaResult<()> {
        tokio::fs::write(path, self.to_bytes()).await?;
        Ok(())
    }
}

pub fn range_label(start: f64, end: f64) -> String {
    format!("src[{:.3}-{:.3}]", start, end)
}

/// Media engine over [`FakeClip`] files.
///
/// `duration_timeouts` probes time out before any succeeds.
#[derive(Default)]
pub struct FakeMedia {
    pub concat_calls: AtomicUsize,
    pub stretch_video_calls: AtomicUsize,
    pub duration_timeouts: AtomicUsize,
}

#[async_trait]
impl MediaEngine for FakeMedia {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        let timed_out = self
            .duration_timeouts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if timed_out {
            return Err(MediaError::Timeout(5));
        }
        Ok(FakeClip::read(path).await?.duration)
    }

    async fn extract(&self, source: &Path, start: f64, end: f64, output: &Path) -> MediaResult<()> {
        FakeClip::read(source).await?;
        FakeClip::new(end - start, range_label(start, end))
            .write(output)
            .await
    }

    async fn stretch_video(&self, input: &Path, ratio: f64, output: &Path) -> MediaResult<()> {
        self.stretch_video_calls.fetch_add(1, Ordering::SeqCst);
        let clip = FakeClip::read(input).await?;
        FakeClip {
            duration: clip.duration * ratio,
            parts: clip.parts,
        }
        .write(output)
        .await
    }

    async fn stretch_audio(&self, input: &Path, tempo: f64, output: &Path) -> MediaResult<()> {
        let clip = FakeClip::read(input).await?;
        FakeClip {
            duration: clip.duration / tempo,
            parts: clip.parts,
        }
        .write(output)
        .await
    }

    async fn mux(&self, video: &Path, audio: &Path, duration: f64, output: &Path) -> MediaResult<()> {
        let video = FakeClip::read(video).await?;
        FakeClip::read(audio).await?;
        FakeClip {
            duration,
            parts: video.parts,
        }
        .write(output)
        .await
    }

    async fn concat(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        let mut merged = FakeClip {
            duration: 0.0,
            parts: Vec::new(),
        };
        for input in inputs {
            let clip = FakeClip::read(input).await?;
            merged.duration += clip.duration;
            merged.parts.extend(clip.parts);
        }
        merged.write(output).await
    }
}

pub fn translated(text: &str, language: &str) -> String {
    format!("{} [{}]", text, language.to_lowercase())
}

/// Tags the text with the target language; optionally sleeps a random
/// interval and fails permanently on one input.
#[derive(Default)]
pub struct FakeTranslator {
    pub max_latency_ms: u64,
    pub fail_on: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeTranslator {
    pub fn called_with(&self, text: &str) -> bool {
        self.calls.lock().unwrap().iter().any(|t| t == text)
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, request: &TranslationRequest) -> ProviderResult<String> {
        self.calls.lock().unwrap().push(request.text.clone());

        if self.max_latency_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.max_latency_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_on.as_deref() == Some(request.text.as_str()) {
            return Err(ProviderError::Status {
                service: "fake-translate",
                status: 400,
                body: "unsupported".to_string(),
            });
        }
        Ok(translated(&request.text, &request.target_language))
    }
}

/// Returns a clip whose duration is looked up by text (1s otherwise).
#[derive(Default)]
pub struct FakeSynthesizer {
    pub durations: HashMap<String, f64>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(
        &self,
        text: &str,
        _target_language: &str,
        _voice: &VoiceSelector,
    ) -> ProviderResult<Vec<u8>> {
        let duration = self.durations.get(text).copied().unwrap_or(1.0);
        Ok(FakeClip::new(duration, format!("speech:{}", text)).to_bytes())
    }
}

/// Lip-sync that either copies the clip through or always rejects it.
#[derive(Default)]
pub struct FakeLipSync {
    pub fail: bool,
    pub calls: AtomicUsize,
}

#[async_trait]
impl LipSyncer for FakeLipSync {
    async fn sync(&self, clip: &Path, output: &Path) -> ProviderResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ProviderError::PredictionFailed {
                id: "p1".to_string(),
                status: "failed".to_string(),
                message: "no face detected".to_string(),
            });
        }
        tokio::fs::copy(clip, output).await?;
        Ok(())
    }
}

pub struct FakeTranscriber {
    pub transcript: Transcript,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _media_url: &str) -> ProviderResult<Transcript> {
        Ok(self.transcript.clone())
    }
}

/// In-memory object store. Downloads of unknown names fail.
#[derive(Default)]
pub struct FakeObjects {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub deleted: Mutex<Vec<String>>,
}

impl FakeObjects {
    pub fn with_object(self, name: &str, bytes: Vec<u8>) -> Self {
        self.objects.lock().unwrap().insert(name.to_string(), bytes);
        self
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.objects.lock().unwrap().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl ObjectStore for FakeObjects {
    async fn upload(&self, name: &str, path: &Path) -> StorageResult<()> {
        let bytes = tokio::fs::read(path).await?;
        self.objects.lock().unwrap().insert(name.to_string(), bytes);
        Ok(())
    }

    async fn get_link(&self, name: &str) -> StorageResult<String> {
        Ok(format!("https://media.test/{}", name))
    }

    async fn download(&self, name: &str, path: &Path) -> StorageResult<()> {
        let bytes = self.get(name).ok_or_else(|| StorageError::not_found(name))?;
        tokio::fs::write(path, bytes).await?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.objects.lock().unwrap().remove(name);
        self.deleted.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

pub const SOURCE_NAME: &str = "source.mp4";

/// Fast retries and a scratch root under `work_dir`.
pub fn test_config(work_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        segment_parallelism: 4,
        max_ffmpeg_processes: 2,
        ffmpeg_timeout: Duration::from_secs(5),
        concat_batch_size: 3,
        work_dir: work_dir.to_path_buf(),
        segment_retries: 1,
        call_retries: 1,
        backoff_base: Duration::from_millis(1),
        backoff_max: Duration::from_millis(2),
        lip_sync_default: false,
        gap_epsilon: 0.001,
        tail_threshold: 0.5,
        translation_context: 2,
    }
}

/// A service wired to fakes, keeping handles on each fake for assertions.
pub struct Harness {
    pub service: DubbingService,
    pub store: Arc<InMemoryStore>,
    pub objects: Arc<FakeObjects>,
    pub media: Arc<FakeMedia>,
    pub translator: Arc<FakeTranslator>,
    pub lip_sync: Arc<FakeLipSync>,
    pub work_dir: tempfile::TempDir,
}

pub struct HarnessBuilder {
    pub segments: Vec<Segment>,
    pub source_duration: f64,
    pub credits: i64,
    pub translator: FakeTranslator,
    pub synthesizer: FakeSynthesizer,
    pub lip_sync: FakeLipSync,
    pub media: FakeMedia,
    pub parallelism: usize,
}

impl HarnessBuilder {
    pub fn new(segments: Vec<Segment>, source_duration: f64) -> Self {
        Self {
            segments,
            source_duration,
            credits: 100,
            translator: FakeTranslator::default(),
            synthesizer: FakeSynthesizer::default(),
            lip_sync: FakeLipSync::default(),
            media: FakeMedia::default(),
            parallelism: 4,
        }
    }

    pub fn build(self) -> Harness {
        let work_dir = tempfile::tempdir().unwrap();
        let mut config = test_config(work_dir.path());
        config.segment_parallelism = self.parallelism;

        let store = Arc::new(InMemoryStore::new().with_team(TEAM_ID, self.credits));
        let objects = Arc::new(FakeObjects::default().with_object(
            SOURCE_NAME,
            FakeClip::new(self.source_duration, "source").to_bytes(),
        ));
        let media = Arc::new(self.media);
        let translator = Arc::new(self.translator);
        let lip_sync = Arc::new(self.lip_sync);

        let service = DubbingService::new(DubbingContext {
            config,
            transcriber: Arc::new(FakeTranscriber {
                transcript: Transcript::new("english", self.segments),
            }),
            collaborators: Collaborators {
                translator: translator.clone(),
                synthesizer: Arc::new(self.synthesizer),
                lip_syncer: Some(lip_sync.clone()),
                media: media.clone(),
            },
            objects: objects.clone(),
            transformations: store.clone(),
            credits: store.clone(),
        });

        Harness {
            service,
            store,
            objects,
            media,
            translator,
            lip_sync,
            work_dir,
        }
    }
}

pub const TEAM_ID: i64 = 7;
pub const PROJECT_ID: i64 = 42;

/// Segments `len` seconds long, each followed by `pause` seconds of silence.
pub fn spaced_segments(count: u32, len: f64, pause: f64) -> Vec<Segment> {
    (0..count)
        .map(|i| {
            let start = i as f64 * (len + pause);
            Segment::new(i, start, start + len, format!("line {}", i))
        })
        .collect()
}

/// Whether `dir` contains any entries.
pub fn has_entries(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
