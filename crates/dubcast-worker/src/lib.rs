//! Dubbing worker.
//!
//! This crate provides:
//! - Transcript cleanup and credit reservation
//! - Per-segment dubbing (translate, synthesize, stretch, mux, lip-sync, gap-fill)
//! - Bounded-concurrency segment scheduling with progress and fail-fast abort
//! - Job entry points over pluggable stores and collaborators

pub mod config;
pub mod credits;
pub mod error;
pub mod gap_fill;
pub mod logging;
pub mod metrics;
pub mod retry;
pub mod scheduler;
pub mod segment;
pub mod service;
pub mod store;
pub mod transcript;

pub use config::WorkerConfig;
pub use credits::{CreditGuard, CreditReservation};
pub use error::{WorkerError, WorkerResult};
pub use gap_fill::{GapFiller, GapPlan};
pub use logging::JobLogger;
pub use retry::{retry_async, BackoffPolicy, RetryResult};
pub use scheduler::{progress_percent, ProgressSink, SegmentScheduler, StoreProgress};
pub use segment::{
    Collaborators, SegmentJob, SegmentOutput, SegmentProcessor, SegmentSettings, SegmentTask,
};
pub use service::{DubbingContext, DubbingService, TranslationJob};
pub use store::{CreditStore, InMemoryStore, StoreError, StoreResult, TransformationStore};
pub use transcript::{clean_segments, clean_transcript, MERGE_THRESHOLD_SECS};
