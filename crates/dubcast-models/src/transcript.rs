//! Transcript of one media file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::credits::credits_for_seconds;
use crate::Segment;

/// Ordered segments plus the language detected by the recognizer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transcript {
    #[serde(rename = "detected_language", default)]
    pub detected_language: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl Transcript {
    pub fn new(detected_language: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            detected_language: detected_language.into(),
            segments,
        }
    }

    /// Sum of segment durations in seconds (speech time, not media length).
    pub fn speech_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Credits needed to dub this transcript.
    pub fn required_credits(&self) -> i64 {
        credits_for_seconds(self.speech_duration())
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_credits_rounds_up() {
        let transcript = Transcript::new(
            "english",
            vec![
                Segment::new(0, 0.0, 30.0, "a"),
                Segment::new(1, 40.0, 71.0, "b"),
            ],
        );
        // 61 seconds of speech -> 2 minutes
        assert_eq!(transcript.required_credits(), 2);
    }

    #[test]
    fn test_serializes_detected_language_key() {
        let transcript = Transcript::new("hindi", vec![]);
        let json = serde_json::to_value(&transcript).unwrap();
        assert_eq!(json["detected_language"], "hindi");
    }
}
