//! Transcript segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A single recognized word with its timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Word {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

/// A contiguous span of speech in the source media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    /// Ordinal position in the transcript (0-based after cleanup)
    pub id: u32,
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Spoken text
    pub text: String,
    /// Word-level timings, when the recognizer provides them
    #[serde(default)]
    pub words: Vec<Word>,
}

impl Segment {
    /// Create a segment without word timings.
    pub fn new(id: u32, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start,
            end,
            text: text.into(),
            words: Vec::new(),
        }
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// A segment is usable when it has positive length and non-blank text.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end && !self.text.trim().is_empty()
    }

    /// Copy of this segment carrying different text.
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }
}
