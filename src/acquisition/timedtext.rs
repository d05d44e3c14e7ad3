use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;

use super::validator::raw_payload_plausible;
use super::{StrategyError, StrategyKind, TranscriptCandidate, TranscriptStrategy, VideoId};
use crate::config::AcquisitionConfig;
use crate::page::{Fetch, PageSurface};
use crate::utils::markup_to_text;

/// Which caption track to request from the timed-text endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Default,
    /// Speech-recognition captions (`kind=asr`)
    AutoGenerated,
}

/// Fetches a caption track by identifier from the host's public timed-text endpoint
pub struct TimedTextStrategy {
    fetcher: Arc<dyn Fetch>,
    endpoint: String,
    language: String,
    track: TrackKind,
}

impl TimedTextStrategy {
    pub fn new(fetcher: Arc<dyn Fetch>, config: &AcquisitionConfig, track: TrackKind) -> Self {
        Self {
            fetcher,
            endpoint: config.timedtext_url.clone(),
            language: config.language.clone(),
            track,
        }
    }

    pub fn track_url(&self, video_id: &VideoId) -> String {
        let mut url = format!(
            "{}?lang={}&v={}",
            self.endpoint,
            urlencoding::encode(&self.language),
            urlencoding::encode(video_id.as_str())
        );
        if self.track == TrackKind::AutoGenerated {
            url.push_str("&kind=asr");
        }
        url
    }
}

fn text_node_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)<text\b[^>]*>(.*?)</text>").expect("static text node pattern"))
}

/// Concatenate the content of every `<text>` node in a timed-text document
pub fn parse_caption_markup(markup: &str) -> Result<String, StrategyError> {
    let nodes: Vec<String> = text_node_pattern()
        .captures_iter(markup)
        .map(|caps| markup_to_text(&caps[1]))
        .collect();

    if nodes.is_empty() {
        return Err(StrategyError::NoTextNodes);
    }

    Ok(nodes.join(" "))
}

#[async_trait]
impl TranscriptStrategy for TimedTextStrategy {
    fn kind(&self) -> StrategyKind {
        match self.track {
            TrackKind::Default => StrategyKind::DirectTrack,
            TrackKind::AutoGenerated => StrategyKind::AutoGeneratedTrack,
        }
    }

    async fn attempt(&self, video_id: &VideoId, _page: &dyn PageSurface) -> Result<TranscriptCandidate, StrategyError> {
        let url = self.track_url(video_id);
        let fetched = self.fetcher.get_text(&url).await?;

        if !fetched.is_success() {
            return Err(StrategyError::HttpStatus(fetched.status));
        }
        if !raw_payload_plausible(&fetched.body) {
            return Err(StrategyError::PayloadTooShort(fetched.body.chars().count()));
        }

        let text = parse_caption_markup(&fetched.body)?;
        Ok(TranscriptCandidate::new(text, self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FetchError, FetchedBody, MemoryPage};
    use std::sync::Mutex;

    struct Recorded {
        status: u16,
        body: String,
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for Recorded {
        async fn get_text(&self, url: &str) -> Result<FetchedBody, FetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            Ok(FetchedBody { status: self.status, body: self.body.clone() })
        }
    }

    fn fetcher(status: u16, body: &str) -> Arc<Recorded> {
        Arc::new(Recorded { status, body: body.to_string(), urls: Mutex::new(Vec::new()) })
    }

    const TRACK: &str = r#"<?xml version="1.0" encoding="utf-8" ?><transcript><text start="0.1" dur="2">Welcome back to</text><text start="2.1" dur="3">the channel, it&amp;#39;s great</text></transcript>"#;

    #[test]
    fn parses_text_nodes() {
        assert_eq!(parse_caption_markup(TRACK).unwrap(), "Welcome back to the channel, it's great");
    }

    #[test]
    fn markup_without_text_nodes_fails() {
        let err = parse_caption_markup("<transcript></transcript>").unwrap_err();
        assert!(matches!(err, StrategyError::NoTextNodes));
    }

    #[tokio::test]
    async fn builds_track_urls() {
        let config = AcquisitionConfig::default();
        let direct = TimedTextStrategy::new(fetcher(200, ""), &config, TrackKind::Default);
        let asr = TimedTextStrategy::new(fetcher(200, ""), &config, TrackKind::AutoGenerated);
        let id = VideoId::new("abc123");

        assert_eq!(direct.track_url(&id), "https://www.youtube.com/api/timedtext?lang=en&v=abc123");
        assert_eq!(asr.track_url(&id), "https://www.youtube.com/api/timedtext?lang=en&v=abc123&kind=asr");
        assert_eq!(direct.kind(), StrategyKind::DirectTrack);
        assert_eq!(asr.kind(), StrategyKind::AutoGeneratedTrack);
    }

    #[tokio::test]
    async fn fetches_and_parses_track() {
        let source = fetcher(200, TRACK);
        let strategy = TimedTextStrategy::new(source.clone(), &AcquisitionConfig::default(), TrackKind::AutoGenerated);
        let page = MemoryPage::new("https://www.youtube.com/watch?v=abc123");

        let candidate = strategy.attempt(&VideoId::new("abc123"), &page).await.unwrap();

        assert_eq!(candidate.source, StrategyKind::AutoGeneratedTrack);
        assert!(candidate.text.starts_with("Welcome back"));
        assert_eq!(source.urls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_error_status_and_short_payloads() {
        let page = MemoryPage::new("https://www.youtube.com/watch?v=abc123");
        let config = AcquisitionConfig::default();
        let id = VideoId::new("abc123");

        let not_found = TimedTextStrategy::new(fetcher(404, TRACK), &config, TrackKind::Default);
        assert!(matches!(not_found.attempt(&id, &page).await, Err(StrategyError::HttpStatus(404))));

        let empty = TimedTextStrategy::new(fetcher(200, ""), &config, TrackKind::Default);
        assert!(matches!(empty.attempt(&id, &page).await, Err(StrategyError::PayloadTooShort(0))));
    }
}
