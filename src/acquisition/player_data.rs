use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use super::{StrategyError, StrategyKind, TranscriptCandidate, TranscriptStrategy, VideoId};
use crate::page::{selectors, Fetch, PageSurface};
use crate::utils::{balanced_object_at, collapse_whitespace};

/// Player configuration embedded in the watch page. Every level may be absent.
#[derive(Debug, Default, Deserialize)]
pub struct PlayerResponse {
    #[serde(default)]
    pub captions: Option<Captions>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Captions {
    #[serde(rename = "playerCaptionsTracklistRenderer", default)]
    pub tracklist: Option<CaptionTracklist>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptionTracklist {
    #[serde(rename = "captionTracks", default)]
    pub caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl", default)]
    pub base_url: Option<String>,
    #[serde(rename = "languageCode", default)]
    pub language_code: Option<String>,
}

impl PlayerResponse {
    /// First listed caption track, checking each nesting level
    pub fn first_caption_track(&self) -> Result<&CaptionTrack, StrategyError> {
        self.captions
            .as_ref()
            .and_then(|c| c.tracklist.as_ref())
            .and_then(|t| t.caption_tracks.as_ref())
            .and_then(|tracks| tracks.first())
            .ok_or(StrategyError::NoCaptionTracks)
    }
}

/// Per-segment caption document (`fmt=json3`)
#[derive(Debug, Deserialize)]
struct SegmentedCaptions {
    #[serde(default)]
    events: Option<Vec<CaptionEvent>>,
}

#[derive(Debug, Deserialize)]
struct CaptionEvent {
    #[serde(default)]
    segs: Option<Vec<CaptionSegment>>,
}

#[derive(Debug, Deserialize)]
struct CaptionSegment {
    #[serde(default)]
    utf8: Option<String>,
}

fn assignment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"ytInitialPlayerResponse\s*=\s*\{").expect("static assignment pattern"))
}

/// Pull the serialized player response out of page markup
pub fn extract_player_response(markup: &str) -> Result<PlayerResponse, StrategyError> {
    let assignment = assignment_pattern()
        .find(markup)
        .ok_or(StrategyError::PlayerDataMissing)?;
    let object_start = assignment.end() - 1;
    let object = balanced_object_at(markup, object_start).ok_or(StrategyError::PlayerDataMissing)?;

    serde_json::from_str(object).map_err(StrategyError::PlayerDataDecode)
}

/// Join every segment of every event, collapsing whitespace
pub fn parse_segmented_captions(payload: &str) -> Result<String, StrategyError> {
    let captions: SegmentedCaptions =
        serde_json::from_str(payload).map_err(|e| StrategyError::CaptionShape(e.to_string()))?;
    let events = captions
        .events
        .ok_or_else(|| StrategyError::CaptionShape("missing events".to_string()))?;

    let joined = events
        .iter()
        .filter_map(|event| event.segs.as_ref())
        .map(|segs| {
            segs.iter()
                .map(|seg| seg.utf8.as_deref().unwrap_or(""))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join(" ");

    Ok(collapse_whitespace(&joined))
}

/// Reads caption tracks from the player configuration embedded in the page
pub struct PlayerDataStrategy {
    fetcher: Arc<dyn Fetch>,
}

impl PlayerDataStrategy {
    pub fn new(fetcher: Arc<dyn Fetch>) -> Self {
        Self { fetcher }
    }

    async fn player_response(&self, page: &dyn PageSurface) -> Result<PlayerResponse, StrategyError> {
        if let Some(global) = page.global_json(selectors::PLAYER_RESPONSE_GLOBAL).await {
            tracing::debug!("Found {} in page globals", selectors::PLAYER_RESPONSE_GLOBAL);
            return decode_global(global);
        }

        tracing::debug!("Extracting {} from page markup", selectors::PLAYER_RESPONSE_GLOBAL);
        extract_player_response(&page.document_markup().await)
    }
}

fn decode_global(global: Value) -> Result<PlayerResponse, StrategyError> {
    if global.is_null() {
        return Err(StrategyError::PlayerDataMissing);
    }
    serde_json::from_value(global).map_err(StrategyError::PlayerDataDecode)
}

fn segmented_url(base_url: &str) -> Result<String, StrategyError> {
    let mut url = Url::parse(base_url).map_err(|_| StrategyError::MissingTrackUrl)?;
    url.query_pairs_mut().append_pair("fmt", "json3");
    Ok(url.into())
}

#[async_trait]
impl TranscriptStrategy for PlayerDataStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EmbeddedPlayerData
    }

    async fn attempt(&self, _video_id: &VideoId, page: &dyn PageSurface) -> Result<TranscriptCandidate, StrategyError> {
        let response = self.player_response(page).await?;
        let track = response.first_caption_track()?;
        let base_url = track
            .base_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or(StrategyError::MissingTrackUrl)?;

        tracing::debug!(
            "Fetching caption track (language: {})",
            track.language_code.as_deref().unwrap_or("unknown")
        );
        let fetched = self.fetcher.get_text(&segmented_url(base_url)?).await?;
        if !fetched.is_success() {
            return Err(StrategyError::HttpStatus(fetched.status));
        }

        let text = parse_segmented_captions(&fetched.body)?;
        Ok(TranscriptCandidate::new(text, self.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::{FetchError, FetchedBody, MemoryPage};
    use serde_json::json;
    use std::sync::Mutex;

    struct Json3 {
        urls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Fetch for Json3 {
        async fn get_text(&self, url: &str) -> Result<FetchedBody, FetchError> {
            self.urls.lock().unwrap().push(url.to_string());
            let body = json!({
                "events": [
                    { "tStartMs": 0 },
                    { "segs": [{ "utf8": "Today we" }, { "utf8": "  learn\n" }] },
                    { "segs": [{ "utf8": "about lifetimes" }, {}] }
                ]
            });
            Ok(FetchedBody { status: 200, body: body.to_string() })
        }
    }

    fn player(base_url: &str) -> Value {
        json!({
            "captions": {
                "playerCaptionsTracklistRenderer": {
                    "captionTracks": [{ "baseUrl": base_url, "languageCode": "en" }]
                }
            }
        })
    }

    #[test]
    fn extracts_player_response_from_markup() {
        let markup = format!(
            "<script>var ytInitialPlayerResponse = {};var meta = {{}};</script>",
            player("https://www.youtube.com/api/timedtext?v=a&sig=};")
        );
        let response = extract_player_response(&markup).unwrap();
        let track = response.first_caption_track().unwrap();
        assert_eq!(track.base_url.as_deref(), Some("https://www.youtube.com/api/timedtext?v=a&sig=};"));
    }

    #[test]
    fn missing_or_broken_player_data() {
        assert!(matches!(extract_player_response("<html></html>"), Err(StrategyError::PlayerDataMissing)));
        assert!(matches!(
            extract_player_response("ytInitialPlayerResponse = {\"captions\": nope};"),
            Err(StrategyError::PlayerDataDecode(_))
        ));
    }

    #[test]
    fn absent_levels_mean_no_tracks() {
        for value in [json!({}), json!({"captions": {}}), json!({"captions": {"playerCaptionsTracklistRenderer": {"captionTracks": []}}})] {
            let response: PlayerResponse = serde_json::from_value(value).unwrap();
            assert!(matches!(response.first_caption_track(), Err(StrategyError::NoCaptionTracks)));
        }
    }

    #[test]
    fn segmented_captions_require_events() {
        assert!(matches!(parse_segmented_captions("{}"), Err(StrategyError::CaptionShape(_))));
        assert!(matches!(parse_segmented_captions("not json"), Err(StrategyError::CaptionShape(_))));
    }

    #[tokio::test]
    async fn prefers_page_global_and_requests_json3() {
        let fetcher = Arc::new(Json3 { urls: Mutex::new(Vec::new()) });
        let page = MemoryPage::new("https://www.youtube.com/watch?v=a");
        page.set_global(selectors::PLAYER_RESPONSE_GLOBAL, player("https://www.youtube.com/api/timedtext?v=a")).await;

        let strategy = PlayerDataStrategy::new(fetcher.clone());
        let candidate = strategy.attempt(&VideoId::new("a"), &page).await.unwrap();

        assert_eq!(candidate.text, "Today we learn about lifetimes");
        assert_eq!(candidate.source, StrategyKind::EmbeddedPlayerData);
        assert_eq!(
            fetcher.urls.lock().unwrap().as_slice(),
            ["https://www.youtube.com/api/timedtext?v=a&fmt=json3"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_markup_when_global_missing() {
        let fetcher = Arc::new(Json3 { urls: Mutex::new(Vec::new()) });
        let page = MemoryPage::new("https://www.youtube.com/watch?v=a");
        page.set_markup(format!("ytInitialPlayerResponse = {};", player("https://example.com/track?x=1"))).await;

        let candidate = PlayerDataStrategy::new(fetcher).attempt(&VideoId::new("a"), &page).await.unwrap();
        assert_eq!(candidate.text, "Today we learn about lifetimes");
    }
}
