#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for dubbing media operations.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - A runner bounded by its own process limiter, with timeouts
//! - FFprobe duration and stream probing
//! - The audio/video stretch policy used to reconcile dubbed timing
//! - Clip operations (extract, stretch, mux, concat) behind [`MediaEngine`]
//! - Batched concatenation for tools with an input ceiling
//! - Per-job scratch directories with guaranteed cleanup

pub mod command;
pub mod concat;
pub mod engine;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod scratch;
pub mod stretch;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{BatchConcatenator, DEFAULT_BATCH_SIZE};
pub use engine::{EncodingSettings, FfmpegEngine, MediaEngine};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, remove_if_exists};
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use scratch::{ClipStage, ScratchArena};
pub use stretch::{atempo_filter, StretchPlan, MAX_AUDIO_SLOWDOWN};
