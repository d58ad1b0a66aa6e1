//! Transformation records.
//!
//! A transformation is one rendition of a project's media: the source itself
//! (`is_source == true`) or a dubbed translation into a target language.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::Transcript;

/// Persisted identifier of a transformation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct TransformationId(pub i64);

impl fmt::Display for TransformationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a transformation.
///
/// `Starting -> Processing -> {Complete | Error}`. Terminal states are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransformationStatus {
    /// Row created, no work started
    #[default]
    Starting,
    /// Segments are being dubbed
    Processing,
    /// Final media uploaded and transcript stored
    Complete,
    /// Job failed; no media was published
    Error,
}

impl TransformationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransformationStatus::Starting => "starting",
            TransformationStatus::Processing => "processing",
            TransformationStatus::Complete => "complete",
            TransformationStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TransformationStatus::Complete | TransformationStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// Transcription-only transformations are created directly as complete, so
    /// `Starting -> Complete` is allowed. A failure before processing starts
    /// (`Starting -> Error`) is allowed too.
    pub fn can_transition_to(&self, next: TransformationStatus) -> bool {
        use TransformationStatus::*;
        matches!(
            (self, next),
            (Starting, Processing)
                | (Starting, Complete)
                | (Starting, Error)
                | (Processing, Complete)
                | (Processing, Error)
        )
    }
}

impl fmt::Display for TransformationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Rejected status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: TransformationStatus,
    pub to: TransformationStatus,
}

/// A persisted transformation row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transformation {
    pub id: TransformationId,
    pub project_id: i64,
    pub target_language: String,
    /// Object-storage name of this rendition's media file
    pub target_media: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Transcript>,
    pub is_source: bool,
    #[serde(default)]
    pub status: TransformationStatus,
    /// Percentage in `[0, 100]`
    #[serde(default)]
    pub progress: f64,
    pub created: DateTime<Utc>,
}

impl Transformation {
    /// Apply a status change, enforcing the lifecycle.
    pub fn transition(&mut self, next: TransformationStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Fields needed to insert a transformation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransformation {
    pub project_id: i64,
    pub target_language: String,
    pub target_media: String,
    pub transcript: Option<Transcript>,
    pub is_source: bool,
    pub status: TransformationStatus,
    pub progress: f64,
}

impl NewTransformation {
    /// An empty `starting` row awaiting a dubbing job.
    pub fn pending(project_id: i64, target_language: impl Into<String>, target_media: impl Into<String>) -> Self {
        Self {
            project_id,
            target_language: target_language.into(),
            target_media: target_media.into(),
            transcript: None,
            is_source: false,
            status: TransformationStatus::Starting,
            progress: 0.0,
        }
    }

    pub fn into_transformation(self, id: TransformationId) -> Transformation {
        Transformation {
            id,
            project_id: self.project_id,
            target_language: self.target_language,
            target_media: self.target_media,
            transcript: self.transcript,
            is_source: self.is_source,
            status: self.status,
            progress: self.progress,
            created: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        use TransformationStatus::*;
        assert!(Starting.can_transition_to(Processing));
        assert!(Processing.can_transition_to(Complete));
        assert!(Processing.can_transition_to(Error));
        assert!(!Complete.can_transition_to(Error));
        assert!(!Error.can_transition_to(Complete));
        assert!(!Processing.can_transition_to(Starting));
        assert!(!Complete.can_transition_to(Complete));
    }

    #[test]
    fn test_terminal_written_once() {
        let mut t = NewTransformation::pending(1, "hindi", "x_dubbed.mp4")
            .into_transformation(TransformationId(9));
        t.transition(TransformationStatus::Processing).unwrap();
        t.transition(TransformationStatus::Error).unwrap();

        let err = t.transition(TransformationStatus::Complete).unwrap_err();
        assert_eq!(err.from, TransformationStatus::Error);
        assert_eq!(t.status, TransformationStatus::Error);
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&TransformationStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
