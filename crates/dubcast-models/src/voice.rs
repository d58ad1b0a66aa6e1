//! Voice selection for speech synthesis.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which synthetic voice speaks the translated text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceSelector {
    #[default]
    Male,
    Female,
    /// Provider-specific voice id
    Custom(String),
}

impl VoiceSelector {
    /// Parse a loose selector string ("male", "female", or a raw voice id).
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "" | "male" => VoiceSelector::Male,
            "female" => VoiceSelector::Female,
            _ => VoiceSelector::Custom(s.trim().to_string()),
        }
    }
}

impl fmt::Display for VoiceSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoiceSelector::Male => write!(f, "male"),
            VoiceSelector::Female => write!(f, "female"),
            VoiceSelector::Custom(id) => write!(f, "custom:{}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(VoiceSelector::parse("Female"), VoiceSelector::Female);
        assert_eq!(VoiceSelector::parse(""), VoiceSelector::Male);
        assert_eq!(
            VoiceSelector::parse("abc123"),
            VoiceSelector::Custom("abc123".to_string())
        );
    }
}
