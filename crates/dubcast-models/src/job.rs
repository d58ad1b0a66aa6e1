//! Dubbing job identifiers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique string scoping all scratch artifacts of one translation job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobIdentifier(pub String);

impl JobIdentifier {
    /// Build `{project}-{YYYY-MM-DD-HH:MM:SS}-{language}`.
    pub fn generate(project_id: i64, target_language: &str, at: DateTime<Utc>) -> Self {
        Self(format!(
            "{}-{}-{}",
            project_id,
            at.format("%Y-%m-%d-%H:%M:%S"),
            target_language
        ))
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe form (no path separators or colons).
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| match c {
                '/' | '\\' | ':' => '_',
                c if c.is_whitespace() => '_',
                c => c,
            })
            .collect()
    }
}

impl fmt::Display for JobIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Object-storage name of a job's final dubbed media.
pub fn dubbed_media_name(identifier: &JobIdentifier) -> String {
    format!("{}_dubbed.mp4", identifier.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_generate_identifier() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let id = JobIdentifier::generate(42, "HINDI", at);
        assert_eq!(id.as_str(), "42-2024-03-09-14:05:07-HINDI");
        assert_eq!(dubbed_media_name(&id), "42-2024-03-09-14:05:07-HINDI_dubbed.mp4");
    }

    #[test]
    fn test_file_stem_strips_separators() {
        let id = JobIdentifier::from_string("a/b:c d");
        assert_eq!(id.file_stem(), "a_b_c_d");
    }
}
