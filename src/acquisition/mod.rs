use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod interactive;
pub mod player_data;
pub mod timedtext;
pub mod validator;

use crate::config::AcquisitionConfig;
use crate::page::{selectors, Fetch, FetchError, PageSurface};

pub use interactive::InteractiveStrategy;
pub use player_data::PlayerDataStrategy;
pub use timedtext::{TimedTextStrategy, TrackKind};

/// Opaque key of the content item, read once from the page location
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Read the identifier from a watch-page location's query parameters
    pub fn from_location(location: &str) -> Option<Self> {
        crate::utils::video_id_from_location(location).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Extraction techniques, in priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StrategyKind {
    DirectTrack,
    AutoGeneratedTrack,
    EmbeddedPlayerData,
    InteractiveUi,
}

impl StrategyKind {
    pub const PRIORITY: [StrategyKind; 4] = [
        StrategyKind::DirectTrack,
        StrategyKind::AutoGeneratedTrack,
        StrategyKind::EmbeddedPlayerData,
        StrategyKind::InteractiveUi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::DirectTrack => "direct-track",
            StrategyKind::AutoGeneratedTrack => "auto-generated-track",
            StrategyKind::EmbeddedPlayerData => "embedded-player-data",
            StrategyKind::InteractiveUi => "interactive-ui",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            StrategyKind::DirectTrack => "Default-language caption track from the timed-text endpoint",
            StrategyKind::AutoGeneratedTrack => "Auto-generated (ASR) caption track from the timed-text endpoint",
            StrategyKind::EmbeddedPlayerData => "First caption track listed in the embedded player configuration",
            StrategyKind::InteractiveUi => "Transcript panel opened through the page UI",
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unvalidated transcript text produced by one strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptCandidate {
    pub text: String,
    pub source: StrategyKind,
}

impl TranscriptCandidate {
    pub fn new(text: impl Into<String>, source: StrategyKind) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

/// Why a single strategy produced nothing
#[derive(thiserror::Error, Debug)]
pub enum StrategyError {
    #[error("request failed: {0}")]
    Network(#[from] FetchError),

    #[error("endpoint returned HTTP {0}")]
    HttpStatus(u16),

    #[error("payload empty or too short ({0} chars)")]
    PayloadTooShort(usize),

    #[error("no text nodes found in caption markup")]
    NoTextNodes,

    #[error("player response data not found")]
    PlayerDataMissing,

    #[error("player response is not valid JSON: {0}")]
    PlayerDataDecode(#[source] serde_json::Error),

    #[error("no caption tracks available in player response")]
    NoCaptionTracks,

    #[error("caption track has no URL")]
    MissingTrackUrl,

    #[error("caption payload has an unexpected shape: {0}")]
    CaptionShape(String),

    #[error("{0} not found")]
    ElementMissing(&'static str),

    #[error("transcript elements not found after opening UI")]
    PanelNotRendered,

    #[error("UI extraction failed after {0} attempts")]
    UiExhausted(u32),
}

/// One extraction technique.
///
/// Strategies keep no state between invocations and never retry internally.
#[async_trait]
pub trait TranscriptStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn attempt(&self, video_id: &VideoId, page: &dyn PageSurface) -> Result<TranscriptCandidate, StrategyError>;
}

/// Terminal output of one acquisition run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum AcquisitionResult {
    Success { text: String, source: StrategyKind },
    /// Every strategy failed; `text` is the page title, possibly empty
    Degraded { text: String },
    Failure { reason: String },
}

impl AcquisitionResult {
    /// Text handed to classification; empty for `Failure`
    pub fn text(&self) -> &str {
        match self {
            AcquisitionResult::Success { text, .. } | AcquisitionResult::Degraded { text } => text,
            AcquisitionResult::Failure { .. } => "",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, AcquisitionResult::Success { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            AcquisitionResult::Success { .. } => "success",
            AcquisitionResult::Degraded { .. } => "degraded",
            AcquisitionResult::Failure { .. } => "failure",
        }
    }
}

/// Runs strategies strictly in order and keeps the first validated candidate
pub struct TranscriptAcquirer {
    strategies: Vec<Box<dyn TranscriptStrategy>>,
}

impl TranscriptAcquirer {
    /// Acquirer with the four standard strategies in priority order
    pub fn new(fetcher: Arc<dyn Fetch>, config: &AcquisitionConfig) -> Self {
        Self::with_strategies(vec![
            Box::new(TimedTextStrategy::new(fetcher.clone(), config, TrackKind::Default)),
            Box::new(TimedTextStrategy::new(fetcher.clone(), config, TrackKind::AutoGenerated)),
            Box::new(PlayerDataStrategy::new(fetcher)),
            Box::new(InteractiveStrategy::new(config.ui_timings())),
        ])
    }

    pub fn with_strategies(strategies: Vec<Box<dyn TranscriptStrategy>>) -> Self {
        Self { strategies }
    }

    /// Acquire transcript text for `video_id`. Never fails: when every
    /// strategy comes up empty the page title is returned as `Degraded`.
    pub async fn acquire(&self, video_id: &VideoId, page: &dyn PageSurface) -> AcquisitionResult {
        tracing::info!("Starting transcript acquisition for video: {}", video_id);

        for strategy in &self.strategies {
            let kind = strategy.kind();
            tracing::debug!("Trying {} strategy", kind);

            match strategy.attempt(video_id, page).await {
                Ok(candidate) if validator::validate(&candidate) => {
                    tracing::info!(
                        "{} strategy succeeded ({} chars)",
                        kind,
                        candidate.text.chars().count()
                    );
                    return AcquisitionResult::Success {
                        text: candidate.text,
                        source: candidate.source,
                    };
                }
                Ok(candidate) => {
                    tracing::warn!(
                        "{} strategy produced an implausible candidate ({} chars), moving on",
                        kind,
                        candidate.text.trim().chars().count()
                    );
                }
                Err(e) => {
                    tracing::warn!("{} strategy failed: {}", kind, e);
                }
            }
        }

        let title = page
            .query_text(selectors::VIDEO_TITLE)
            .await
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        tracing::warn!("All transcript strategies failed, using video title as minimal transcript: {:?}", title);

        AcquisitionResult::Degraded { text: title }
    }
}
