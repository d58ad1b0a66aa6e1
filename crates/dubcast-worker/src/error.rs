//! Worker error types.

use thiserror::Error;

use dubcast_models::InvalidTransition;

use crate::store::StoreError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Insufficient credits: {required} required, {remaining} remaining")]
    InsufficientCredits { required: i64, remaining: i64 },

    #[error("Segment {index} failed: {source}")]
    SegmentFailed {
        index: usize,
        #[source]
        source: Box<WorkerError>,
    },

    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Invalid status change: {0}")]
    Transition(#[from] InvalidTransition),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] dubcast_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] dubcast_media::MediaError),

    #[error("Provider error: {0}")]
    Provider(#[from] dubcast_providers::ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn segment_failed(index: usize, source: WorkerError) -> Self {
        Self::SegmentFailed {
            index,
            source: Box::new(source),
        }
    }

    pub fn translation_failed(msg: impl Into<String>) -> Self {
        Self::TranslationFailed(msg.into())
    }

    pub fn synthesis_failed(msg: impl Into<String>) -> Self {
        Self::SynthesisFailed(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Provider(e) => e.is_retryable(),
            WorkerError::Storage(e) => e.is_retryable(),
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::SegmentFailed { source, .. } => source.is_retryable(),
            WorkerError::Io(_) => true,
            _ => false,
        }
    }

    /// Index of the segment this error came from, if any.
    pub fn segment_index(&self) -> Option<usize> {
        match self {
            WorkerError::SegmentFailed { index, .. } => Some(*index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dubcast_media::MediaError;

    #[test]
    fn test_segment_failed_carries_index() {
        let err = WorkerError::segment_failed(3, WorkerError::translation_failed("empty"));
        assert_eq!(err.segment_index(), Some(3));
        assert!(err.to_string().contains("Segment 3"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::from(MediaError::Timeout(30)).is_retryable());
        assert!(!WorkerError::from(MediaError::FfmpegNotFound).is_retryable());
        assert!(!WorkerError::InsufficientCredits {
            required: 3,
            remaining: 1
        }
        .is_retryable());
    }
}
