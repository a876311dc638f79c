pub mod srt;
pub mod writer;

pub use writer::{subtitle_path_for, SubtitleWriter};

use crate::translate::TranslatedSegment;
use std::time::Duration;
use tracing::{debug, warn};

/// Amount a zero-length cue is widened by.
pub const MIN_CUE_DURATION: Duration = Duration::from_millis(1);

/// One timed subtitle entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// Ordered cues ready for serialization.
///
/// Indices are always 1..=N, timestamps have millisecond precision and every
/// cue ends strictly after it starts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SubtitleDocument {
    cues: Vec<Cue>,
}

impl SubtitleDocument {
    /// Build a document from translated segments in the given order.
    ///
    /// Segments are renumbered, not re-sorted. Zero-length cues are widened
    /// by [`MIN_CUE_DURATION`].
    pub fn from_segments(segments: &[TranslatedSegment]) -> Self {
        let mut cues = Vec::with_capacity(segments.len());
        let mut last_start = Duration::ZERO;

        for (i, segment) in segments.iter().enumerate() {
            let start = to_millis(segment.start);
            let mut end = to_millis(segment.end);
            if end <= start {
                debug!("Widening zero-length cue {} at {:?}", i + 1, start);
                end = start + MIN_CUE_DURATION;
            }
            if start < last_start {
                warn!("Cue {} starts before the previous cue", i + 1);
            }
            last_start = start;

            cues.push(Cue {
                index: i + 1,
                start,
                end,
                text: clean_text(&segment.translated_text),
            });
        }

        Self { cues }
    }

    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn len(&self) -> usize {
        self.cues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cues.is_empty()
    }

    pub fn to_srt(&self) -> String {
        srt::format(&self.cues)
    }
}

fn to_millis(d: Duration) -> Duration {
    Duration::from_millis(d.as_millis() as u64)
}

/// Trim and drop blank lines, which would end an SRT block early.
fn clean_text(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
