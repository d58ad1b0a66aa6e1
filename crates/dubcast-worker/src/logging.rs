//! Job-scoped log lines for dubbing runs.

use std::fmt::Display;
use std::time::{Duration, Instant};
use tracing::{error, info, warn, Span};

use dubcast_models::JobIdentifier;

/// Tags every lifecycle event of one dubbing job with its identifier and
/// target language.
#[derive(Debug, Clone)]
pub struct JobLogger {
    identifier: String,
    target_language: String,
    started: Instant,
}

impl JobLogger {
    pub fn new(identifier: &JobIdentifier, target_language: &str) -> Self {
        Self {
            identifier: identifier.to_string(),
            target_language: target_language.to_string(),
            started: Instant::now(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Span covering the whole job; segment spans nest under it.
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "dub_job",
            identifier = %self.identifier,
            language = %self.target_language
        )
    }

    pub fn started(&self, segments: usize, charged: i64) {
        info!(
            identifier = %self.identifier,
            language = %self.target_language,
            segments,
            charged,
            "Dubbing started"
        );
    }

    pub fn segments_dubbed(&self, count: usize) {
        info!(
            identifier = %self.identifier,
            segments = count,
            elapsed_secs = self.elapsed().as_secs_f64(),
            "All segments dubbed, concatenating"
        );
    }

    /// The upload was removed because the job could not be recorded.
    pub fn rolled_back(&self, media: &str, reason: &dyn Display) {
        warn!(
            identifier = %self.identifier,
            media,
            reason = %reason,
            "Completion not recorded, removed uploaded media"
        );
    }

    pub fn failed(&self, err: &dyn Display, refunded: bool) {
        error!(
            identifier = %self.identifier,
            language = %self.target_language,
            refunded,
            elapsed_secs = self.elapsed().as_secs_f64(),
            "Dubbing failed: {}", err
        );
    }

    pub fn completed(&self, media: &str) {
        info!(
            identifier = %self.identifier,
            language = %self.target_language,
            media,
            elapsed_secs = self.elapsed().as_secs_f64(),
            "Dubbing completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logger_carries_identifier() {
        let id = JobIdentifier::from_string("1-2024-01-01-00:00:00-HINDI");
        let logger = JobLogger::new(&id, "HINDI");

        assert_eq!(logger.identifier(), id.as_str());
        assert!(logger.elapsed() < Duration::from_secs(60));
    }
}
