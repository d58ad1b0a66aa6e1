//! Timing reconciliation between a source clip and its dubbed speech.
//!
//! When the synthesized audio runs longer than the clip, both tracks meet in
//! the middle: the video is slowed to the average of the two durations and
//! the audio is sped up to the same length. When the audio is shorter, the
//! video keeps its pace and the audio is slowed to fill it, but never by more
//! than 2x; anything left over is padded with silence.

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, MediaResult};

/// Lowest audio tempo (speed factor) allowed: audio is never slowed more than 2x.
pub const MAX_AUDIO_SLOWDOWN: f64 = 0.5;

/// Per-filter bounds accepted by every FFmpeg build's `atempo`.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

const UNIT_EPSILON: f64 = 1e-6;

/// How one segment's video and audio are time-scaled before muxing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StretchPlan {
    /// Native clip duration in seconds
    pub video_duration: f64,
    /// Synthesized speech duration in seconds
    pub audio_duration: f64,
    /// PTS multiplier for the video (`>= 1.0`, 1.0 = untouched)
    pub video_ratio: f64,
    /// Playback speed factor for the audio (`>= 0.5`)
    pub audio_tempo: f64,
    /// Duration of the dubbed clip
    pub target_duration: f64,
}

impl StretchPlan {
    pub fn compute(video_duration: f64, audio_duration: f64) -> MediaResult<Self> {
        if !(video_duration.is_finite() && video_duration > 0.0) {
            return Err(MediaError::invalid_argument(format!(
                "video duration must be positive, got {}",
                video_duration
            )));
        }
        if !(audio_duration.is_finite() && audio_duration > 0.0) {
            return Err(MediaError::invalid_argument(format!(
                "audio duration must be positive, got {}",
                audio_duration
            )));
        }

        let naive = audio_duration / video_duration;
        let (video_ratio, target_duration) = if naive > 1.0 {
            let target = (audio_duration + video_duration) / 2.0;
            (target / video_duration, target)
        } else {
            (1.0, video_duration)
        };

        let audio_tempo = (audio_duration / target_duration).max(MAX_AUDIO_SLOWDOWN);

        Ok(Self {
            video_duration,
            audio_duration,
            video_ratio,
            audio_tempo,
            target_duration,
        })
    }

    pub fn stretches_video(&self) -> bool {
        (self.video_ratio - 1.0).abs() > UNIT_EPSILON
    }

    pub fn stretches_audio(&self) -> bool {
        (self.audio_tempo - 1.0).abs() > UNIT_EPSILON
    }

    /// Audio length after applying the tempo (may be shorter than the target).
    pub fn stretched_audio_duration(&self) -> f64 {
        self.audio_duration / self.audio_tempo
    }
}

/// Build an `atempo` filter chain for an arbitrary positive tempo.
///
/// Each link stays inside `[0.5, 2.0]`.
pub fn atempo_filter(tempo: f64) -> String {
    let mut remaining = tempo;
    let mut links = Vec::new();

    while remaining > ATEMPO_MAX {
        links.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        links.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    links.push(remaining);

    links
        .iter()
        .map(|t| format!("atempo={:.6}", t))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_longer_audio_meets_in_the_middle() {
        let plan = StretchPlan::compute(5.0, 6.0).unwrap();
        assert!(close(plan.target_duration, 5.5));
        assert!(close(plan.video_ratio, 1.1));
        assert!(close(plan.audio_tempo, 6.0 / 5.5));
        assert!(close(plan.stretched_audio_duration(), 5.5));
        assert!(plan.stretches_video());
    }

    #[test]
    fn test_shorter_audio_keeps_video_pace() {
        let plan = StretchPlan::compute(7.0, 5.0).unwrap();
        assert_eq!(plan.video_ratio, 1.0);
        assert!(close(plan.target_duration, 7.0));
        assert!(close(plan.audio_tempo, 5.0 / 7.0));
        assert!(!plan.stretches_video());
    }

    #[test]
    fn test_equal_durations_are_untouched() {
        let plan = StretchPlan::compute(4.0, 4.0).unwrap();
        assert!(!plan.stretches_video());
        assert!(!plan.stretches_audio());
        assert!(close(plan.target_duration, 4.0));
    }

    #[test]
    fn test_audio_slowdown_is_clamped() {
        let plan = StretchPlan::compute(10.0, 2.0).unwrap();
        assert_eq!(plan.audio_tempo, MAX_AUDIO_SLOWDOWN);
        assert!(close(plan.stretched_audio_duration(), 4.0));
        assert!(close(plan.target_duration, 10.0));
    }

    #[test]
    fn test_scenario_total_duration() {
        let total: f64 = [(5.0, 6.0), (7.0, 5.0), (4.0, 4.0)]
            .iter()
            .map(|(v, a)| StretchPlan::compute(*v, *a).unwrap().target_duration)
            .sum();
        assert!(close(total, 16.5));
    }

    #[test]
    fn test_rejects_non_positive_durations() {
        assert!(StretchPlan::compute(0.0, 1.0).is_err());
        assert!(StretchPlan::compute(1.0, -1.0).is_err());
        assert!(StretchPlan::compute(f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_atempo_chain_bounds() {
        assert_eq!(atempo_filter(1.5), "atempo=1.500000");
        assert_eq!(atempo_filter(3.0), "atempo=2.000000,atempo=1.500000");
        assert_eq!(atempo_filter(0.25), "atempo=0.500000,atempo=0.500000");
    }
}
