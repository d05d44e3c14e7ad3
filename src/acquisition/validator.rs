//! Plausibility gate for candidate transcript text.

use super::{StrategyKind, TranscriptCandidate};

/// Minimum trimmed length of a transcript read from caption data
pub const MIN_TRANSCRIPT_CHARS: usize = 20;

/// Segments read off the rendered panel only need to be non-empty
pub const MIN_PANEL_CHARS: usize = 1;

/// Minimum raw payload length before timed-text markup is parsed at all
pub const MIN_RAW_PAYLOAD_CHARS: usize = 50;

/// Minimum trimmed length for candidates produced by `kind`
pub fn min_chars(kind: StrategyKind) -> usize {
    match kind {
        StrategyKind::InteractiveUi => MIN_PANEL_CHARS,
        StrategyKind::DirectTrack | StrategyKind::AutoGeneratedTrack | StrategyKind::EmbeddedPlayerData => {
            MIN_TRANSCRIPT_CHARS
        }
    }
}

pub fn validate(candidate: &TranscriptCandidate) -> bool {
    candidate.text.trim().chars().count() >= min_chars(candidate.source)
}

/// Cheap rejection of empty or error payloads from the raw caption endpoints
pub fn raw_payload_plausible(raw: &str) -> bool {
    raw.chars().count() >= MIN_RAW_PAYLOAD_CHARS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caption(text: impl Into<String>) -> TranscriptCandidate {
        TranscriptCandidate::new(text, StrategyKind::DirectTrack)
    }

    #[test]
    fn rejects_empty_and_tiny() {
        assert!(!validate(&caption("")));
        assert!(!validate(&caption("x")));
        assert!(!validate(&caption(" ".repeat(25))));
    }

    #[test]
    fn boundary_is_inclusive_after_trimming() {
        assert!(validate(&caption("a".repeat(20))));
        assert!(!validate(&caption("a".repeat(19))));
        assert!(validate(&caption(format!("   {}\n", "a".repeat(20)))));
        assert!(!validate(&caption(format!("   {}   ", "a".repeat(19)))));
    }

    #[test]
    fn caption_sources_share_the_minimum() {
        for kind in [StrategyKind::AutoGeneratedTrack, StrategyKind::EmbeddedPlayerData] {
            assert!(validate(&TranscriptCandidate::new("a".repeat(20), kind)));
            assert!(!validate(&TranscriptCandidate::new("short", kind)));
        }
    }

    #[test]
    fn panel_text_only_needs_content() {
        assert!(validate(&TranscriptCandidate::new("Hello world", StrategyKind::InteractiveUi)));
        assert!(!validate(&TranscriptCandidate::new("  \n ", StrategyKind::InteractiveUi)));
    }

    #[test]
    fn raw_payload_threshold() {
        assert!(!raw_payload_plausible(""));
        assert!(!raw_payload_plausible(&"<".repeat(49)));
        assert!(raw_payload_plausible(&"<".repeat(50)));
    }
}
