use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use super::{StrategyError, StrategyKind, TranscriptCandidate, TranscriptStrategy, VideoId};
use crate::page::{selectors, PageSurface};

/// Settle intervals for UI-driven extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiTimings {
    /// After opening the settings or overflow menu
    pub menu_settle: Duration,
    /// After dismissing a menu that had no transcript entry
    pub dismiss_settle: Duration,
    /// After activating a transcript control
    pub panel_settle: Duration,
    /// Between whole-sequence attempts
    pub retry_pause: Duration,
    pub attempts: u32,
}

impl Default for UiTimings {
    fn default() -> Self {
        Self {
            menu_settle: Duration::from_millis(800),
            dismiss_settle: Duration::from_millis(500),
            panel_settle: Duration::from_millis(1500),
            retry_pause: Duration::from_millis(1000),
            attempts: 3,
        }
    }
}

/// Reads the transcript panel from the live page, opening it through the UI if needed
pub struct InteractiveStrategy {
    timings: UiTimings,
}

impl InteractiveStrategy {
    pub fn new(timings: UiTimings) -> Self {
        Self { timings }
    }

    async fn open_panel_segments(page: &dyn PageSurface) -> Option<String> {
        let segments = page.query_all_text(selectors::TRANSCRIPT_PANEL_SEGMENTS).await;
        join_segments(&segments)
    }

    /// Try each UI route to the transcript panel. Missing controls on one
    /// route fall through to the next; only a missing settings button aborts.
    async fn open_transcript_panel(&self, page: &dyn PageSurface) -> Result<(), StrategyError> {
        if page.click(selectors::SHOW_TRANSCRIPT_BUTTON).await {
            sleep(self.timings.panel_settle).await;
            return Ok(());
        }

        if !page.click(selectors::SETTINGS_BUTTON).await {
            return Err(StrategyError::ElementMissing("settings button"));
        }
        sleep(self.timings.menu_settle).await;

        if page.click_containing(selectors::SETTINGS_MENU_ITEM, "Transcript").await {
            sleep(self.timings.panel_settle).await;
            return Ok(());
        }

        page.dismiss_menus().await;
        sleep(self.timings.dismiss_settle).await;

        if page.click(selectors::MORE_ACTIONS_BUTTON).await {
            sleep(self.timings.menu_settle).await;
            if page.click_containing(selectors::MORE_ACTIONS_ITEM, "Open transcript").await {
                sleep(self.timings.panel_settle).await;
            }
        }

        Ok(())
    }

    async fn read_rendered_segments(page: &dyn PageSurface) -> Option<String> {
        for selector in selectors::TRANSCRIPT_SEGMENTS {
            let segments = page.query_all_text(selector).await;
            if let Some(text) = join_segments(&segments) {
                tracing::debug!("Found transcript elements with selector: {}", selector);
                return Some(text);
            }
        }
        None
    }

    async fn attempt_once(&self, page: &dyn PageSurface) -> Result<String, StrategyError> {
        if let Some(text) = Self::open_panel_segments(page).await {
            tracing::debug!("Transcript panel already open");
            return Ok(text);
        }

        self.open_transcript_panel(page).await?;

        Self::read_rendered_segments(page)
            .await
            .ok_or(StrategyError::PanelNotRendered)
    }
}

impl Default for InteractiveStrategy {
    fn default() -> Self {
        Self::new(UiTimings::default())
    }
}

fn join_segments(segments: &[String]) -> Option<String> {
    if segments.is_empty() {
        return None;
    }
    Some(
        segments
            .iter()
            .map(|s| s.trim())
            .collect::<Vec<_>>()
            .join(" "),
    )
}

#[async_trait]
impl TranscriptStrategy for InteractiveStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::InteractiveUi
    }

    async fn attempt(&self, _video_id: &VideoId, page: &dyn PageSurface) -> Result<TranscriptCandidate, StrategyError> {
        for attempt in 1..=self.timings.attempts {
            tracing::debug!("UI method attempt {}/{}", attempt, self.timings.attempts);

            match self.attempt_once(page).await {
                Ok(text) => return Ok(TranscriptCandidate::new(text, self.kind())),
                Err(e) => {
                    tracing::debug!("UI method attempt {} failed: {}", attempt, e);
                    sleep(self.timings.retry_pause).await;
                }
            }
        }

        Err(StrategyError::UiExhausted(self.timings.attempts))
    }
}
