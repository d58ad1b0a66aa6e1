//! Transcript cleanup.
//!
//! Speech recognizers emit many short, sometimes overlapping or empty
//! segments. Dubbing each one separately produces choppy audio, so segments
//! separated by a short pause are merged and degenerate ones are dropped.

use dubcast_models::{Segment, Transcript};

/// Pauses up to this long (seconds) are merged into one segment.
pub const MERGE_THRESHOLD_SECS: f64 = 0.20;

/// Drop malformed segments, merge near-adjacent ones and renumber from 0.
///
/// A segment is dropped when `start >= end` or its trimmed text is empty.
/// A segment starting within `merge_threshold` of the previous kept segment's
/// end (including overlaps) is folded into it.
pub fn clean_segments(raw: &[Segment], merge_threshold: f64) -> Vec<Segment> {
    let mut cleaned: Vec<Segment> = Vec::with_capacity(raw.len());

    for seg in raw {
        let text = seg.text.trim();
        if seg.start >= seg.end || text.is_empty() {
            continue;
        }

        if let Some(prev) = cleaned.last_mut() {
            if seg.start - prev.end <= merge_threshold {
                prev.end = prev.end.max(seg.end);
                prev.text.push(' ');
                prev.text.push_str(text);
                prev.words.extend(seg.words.iter().cloned());
                continue;
            }
        }

        cleaned.push(Segment {
            id: cleaned.len() as u32,
            start: seg.start,
            end: seg.end,
            text: text.to_string(),
            words: seg.words.clone(),
        });
    }

    cleaned
}

/// Clean a recognizer transcript with the default merge threshold.
pub fn clean_transcript(raw: Transcript) -> Transcript {
    Transcript {
        segments: clean_segments(&raw.segments, MERGE_THRESHOLD_SECS),
        ..raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dubcast_models::Word;

    fn seg(start: f64, end: f64, text: &str) -> Segment {
        Segment::new(99, start, end, text)
    }

    #[test]
    fn test_short_pause_merges() {
        let cleaned = clean_segments(
            &[seg(0.0, 1.0, " Hello"), seg(1.15, 2.0, "world ")],
            MERGE_THRESHOLD_SECS,
        );
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].text, "Hello world");
        assert_eq!(cleaned[0].start, 0.0);
        assert_eq!(cleaned[0].end, 2.0);
    }

    #[test]
    fn test_long_pause_stays_distinct() {
        let cleaned = clean_segments(
            &[seg(0.0, 1.0, "Hello"), seg(1.30, 2.0, "world")],
            MERGE_THRESHOLD_SECS,
        );
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned[1].id, 1);
        assert_eq!(cleaned[1].text, "world");
    }

    #[test]
    fn test_drops_malformed_segments() {
        let cleaned = clean_segments(
            &[
                seg(0.0, 1.0, "   "),
                seg(2.0, 2.0, "zero length"),
                seg(3.0, 2.5, "backwards"),
                seg(4.0, 5.0, "kept"),
            ],
            MERGE_THRESHOLD_SECS,
        );
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].id, 0);
        assert_eq!(cleaned[0].text, "kept");
    }

    #[test]
    fn test_overlap_merges_and_keeps_later_end() {
        let mut first = seg(0.0, 3.0, "a");
        first.words = vec![Word {
            word: "a".into(),
            start: 0.0,
            end: 0.5,
        }];
        let mut second = seg(1.0, 2.0, "b");
        second.words = vec![Word {
            word: "b".into(),
            start: 1.0,
            end: 1.5,
        }];

        let cleaned = clean_segments(&[first, second], MERGE_THRESHOLD_SECS);
        assert_eq!(cleaned.len(), 1);
        assert_eq!(cleaned[0].end, 3.0);
        assert_eq!(cleaned[0].words.len(), 2);
    }

    #[test]
    fn test_output_invariants() {
        let raw: Vec<Segment> = (0..40)
            .map(|i| {
                let start = i as f64 * 0.7;
                let gap = if i % 3 == 0 { 0.05 } else { 0.4 };
                let text = if i % 7 == 0 { "" } else { "word" };
                seg(start, start + 0.7 - gap, text)
            })
            .collect();

        let cleaned = clean_segments(&raw, MERGE_THRESHOLD_SECS);
        for (i, s) in cleaned.iter().enumerate() {
            assert_eq!(s.id as usize, i);
            assert!(s.start < s.end);
            assert!(!s.text.trim().is_empty());
        }
        for pair in cleaned.windows(2) {
            assert!(pair[1].start - pair[0].end > MERGE_THRESHOLD_SECS);
        }
    }

    #[test]
    fn test_clean_transcript_keeps_language() {
        let raw = Transcript::new("english", vec![seg(0.0, 1.0, "hi"), seg(1.1, 2.0, "there")]);
        let cleaned = clean_transcript(raw);
        assert_eq!(cleaned.detected_language, "english");
        assert_eq!(cleaned.segments.len(), 1);
    }
}
