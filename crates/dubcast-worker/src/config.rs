//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::retry::BackoffPolicy;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Segments processed concurrently within one job
    pub segment_parallelism: usize,
    /// Concurrent FFmpeg processes across the worker
    pub max_ffmpeg_processes: usize,
    /// Kill an FFmpeg process after this long
    pub ffmpeg_timeout: Duration,
    /// Inputs per batch when merging segment clips
    pub concat_batch_size: usize,
    /// Root of per-job scratch directories
    pub work_dir: PathBuf,
    /// Retries of a whole segment after its first failure
    pub segment_retries: u32,
    /// Retries of a single collaborator call
    pub call_retries: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Lip-sync when a request does not say
    pub lip_sync_default: bool,
    /// Gaps at or below this (seconds) are not filled
    pub gap_epsilon: f64,
    /// Source tails shorter than this (seconds) are appended to the last clip
    pub tail_threshold: f64,
    /// Neighbouring lines sent with each translation
    pub translation_context: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            segment_parallelism: 4,
            max_ffmpeg_processes: 4,
            ffmpeg_timeout: Duration::from_secs(600),
            concat_batch_size: 5,
            work_dir: PathBuf::from("/tmp/dubcast"),
            segment_retries: 2,
            call_retries: 4,
            backoff_base: Duration::from_secs(5),
            backoff_max: Duration::from_secs(80),
            lip_sync_default: false,
            gap_epsilon: 0.001,
            tail_threshold: 0.5,
            translation_context: 2,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            segment_parallelism: env_parse("WORKER_SEGMENT_PARALLELISM", defaults.segment_parallelism),
            max_ffmpeg_processes: env_parse("WORKER_MAX_FFMPEG", defaults.max_ffmpeg_processes),
            ffmpeg_timeout: Duration::from_secs(env_parse("WORKER_FFMPEG_TIMEOUT_SECS", 600)),
            concat_batch_size: env_parse("WORKER_CONCAT_BATCH_SIZE", defaults.concat_batch_size),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            segment_retries: env_parse("WORKER_SEGMENT_RETRIES", defaults.segment_retries),
            call_retries: env_parse("WORKER_CALL_RETRIES", defaults.call_retries),
            backoff_base: Duration::from_millis(env_parse("WORKER_BACKOFF_BASE_MS", 5_000)),
            backoff_max: Duration::from_millis(env_parse("WORKER_BACKOFF_MAX_MS", 80_000)),
            lip_sync_default: env_parse("WORKER_LIP_SYNC", defaults.lip_sync_default),
            gap_epsilon: env_parse("WORKER_GAP_EPSILON", defaults.gap_epsilon),
            tail_threshold: env_parse("WORKER_TAIL_THRESHOLD", defaults.tail_threshold),
            translation_context: env_parse("WORKER_TRANSLATION_CONTEXT", defaults.translation_context),
        }
    }

    /// Backoff for individual collaborator calls.
    pub fn call_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_base, self.backoff_max, self.call_retries)
    }

    /// Backoff for re-running a whole segment.
    pub fn segment_backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.backoff_base, self.backoff_max, self.segment_retries)
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
