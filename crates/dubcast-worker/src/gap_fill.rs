//! Source-timeline continuity between dubbed clips.
//!
//! Each dubbed clip covers only its segment's `[start, end]`. Whatever the
//! source shows between two segments is cut from the original, with its
//! original audio, and attached in front of the following clip. A short source tail after the last segment is attached
//! behind it.

use std::path::{Path, PathBuf};
use tracing::debug;

use dubcast_media::{BatchConcatenator, ClipStage, MediaEngine, ScratchArena};
use dubcast_models::Segment;

use crate::error::WorkerResult;

/// Source ranges to attach around one clip.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GapPlan {
    /// `[previous.end, segment.start]`, attached before the clip
    pub leading: Option<(f64, f64)>,
    /// `[segment.end, source_end]`, attached after the clip
    pub trailing: Option<(f64, f64)>,
}

impl GapPlan {
    /// Decide which ranges to fill for `segment`.
    ///
    /// `previous_end` is the end of the preceding source segment; the first
    /// segment has none and gets no leading range. The trailing range only applies to the last
    /// segment, and only while the remaining tail is shorter than
    /// `tail_threshold`.
    pub fn compute(
        previous_end: Option<f64>,
        segment: &Segment,
        is_last: bool,
        source_duration: f64,
        epsilon: f64,
        tail_threshold: f64,
    ) -> Self {
        let leading = previous_end
            .filter(|end| segment.start - end > epsilon)
            .map(|end| (end, segment.start));

        let trailing = if is_last {
            let tail = source_duration - segment.end;
            (tail > epsilon && tail < tail_threshold).then_some((segment.end, source_duration))
        } else {
            None
        };

        Self { leading, trailing }
    }

    pub fn is_empty(&self) -> bool {
        self.leading.is_none() && self.trailing.is_none()
    }

    /// Seconds of source media this plan adds.
    pub fn added_duration(&self) -> f64 {
        [self.leading, self.trailing]
            .iter()
            .flatten()
            .map(|(start, end)| end - start)
            .sum()
    }
}

/// Applies a [`GapPlan`] to a per-segment clip.
pub struct GapFiller<'a> {
    media: &'a dyn MediaEngine,
    arena: &'a ScratchArena,
    source: &'a Path,
}

impl<'a> GapFiller<'a> {
    pub fn new(media: &'a dyn MediaEngine, arena: &'a ScratchArena, source: &'a Path) -> Self {
        Self {
            media,
            arena,
            source,
        }
    }

    /// Return the clip with the planned ranges attached (or `clip` itself
    /// when there is nothing to fill).
    pub async fn apply(&self, segment_id: u32, plan: &GapPlan, clip: PathBuf) -> WorkerResult<PathBuf> {
        if plan.is_empty() {
            return Ok(clip);
        }

        let mut parts = Vec::with_capacity(3);
        if let Some((start, end)) = plan.leading {
            let gap = self.arena.clip_path(segment_id, ClipStage::Gap);
            self.media.extract(self.source, start, end, &gap).await?;
            parts.push(gap);
        }
        parts.push(clip);
        if let Some((start, end)) = plan.trailing {
            let tail = self.arena.clip_path(segment_id, ClipStage::Tail);
            self.media.extract(self.source, start, end, &tail).await?;
            parts.push(tail);
        }

        debug!(
            segment_id,
            leading = ?plan.leading,
            trailing = ?plan.trailing,
            "Filling source gaps"
        );

        let filled = self.arena.clip_path(segment_id, ClipStage::Filled);
        BatchConcatenator::new(self.media, self.arena.batch_dir(&format!("gap_{:05}", segment_id)))
            .with_batch_size(2)
            .consume_inputs(true)
            .concat(&parts, &filled)
            .await?;

        Ok(filled)
    }
}
