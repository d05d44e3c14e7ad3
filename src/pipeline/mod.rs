use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acquisition::{AcquisitionResult, TranscriptAcquirer, VideoId};
use crate::classify::{ClassificationAdapter, ClassificationVerdict, ClassifyError};
use crate::page::{selectors, PageSurface};
use crate::utils::is_watch_location;

/// Read-only view of the user's settings
pub trait SettingsStore: Send + Sync {
    fn api_key(&self) -> Option<String>;

    /// Whether videos are classified automatically on navigation
    fn enabled(&self) -> bool;
}

/// Acts on a finished analysis (blocking, redirecting). The core never
/// navigates by itself.
#[async_trait]
pub trait SideEffectExecutor: Send + Sync {
    async fn apply(&self, report: &AnalysisReport);
}

/// Executor that only records the decision in the log
pub struct LoggingExecutor;

#[async_trait]
impl SideEffectExecutor for LoggingExecutor {
    async fn apply(&self, report: &AnalysisReport) {
        if report.blocked {
            tracing::info!("Non-productive content detected for {}: {}", report.video_id, report.verdict.reason);
        } else {
            tracing::info!("Productive content for {}: {}", report.video_id, report.verdict.reason);
        }
    }
}

/// Executor that logs each decision and keeps the report for the caller
#[derive(Default)]
pub struct CollectingExecutor {
    reports: std::sync::Mutex<Vec<AnalysisReport>>,
}

impl CollectingExecutor {
    pub fn reports(&self) -> Vec<AnalysisReport> {
        self.reports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SideEffectExecutor for CollectingExecutor {
    async fn apply(&self, report: &AnalysisReport) {
        LoggingExecutor.apply(report).await;
        self.reports
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(report.clone());
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("Not a YouTube video page")]
    NotVideoPage,

    #[error("Could not find video ID")]
    MissingVideoId,

    #[error("Failed to analyze content: {0}")]
    Classification(#[from] ClassifyError),
}

impl AnalysisError {
    /// Whether the transcript could not be obtained, as opposed to classified
    pub fn is_acquisition(&self) -> bool {
        matches!(self, AnalysisError::NotVideoPage | AnalysisError::MissingVideoId)
    }
}

/// Everything the caller learns about one video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    pub video_id: VideoId,
    pub title: String,
    pub acquisition: AcquisitionResult,
    pub verdict: ClassificationVerdict,
    /// Non-productive content the caller may block or redirect away from
    pub blocked: bool,
    pub content_type: String,
    pub key_points: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisReport {
    pub fn new(video_id: VideoId, title: String, acquisition: AcquisitionResult, verdict: ClassificationVerdict) -> Self {
        Self {
            video_id,
            title,
            blocked: !verdict.is_productive,
            content_type: verdict.content_type().to_string(),
            key_points: vec![verdict.reason.clone()],
            acquisition,
            verdict,
            analyzed_at: Utc::now(),
        }
    }
}

/// Acquire-then-classify pass over one page
pub struct VideoAnalyzer {
    page: Arc<dyn PageSurface>,
    acquirer: TranscriptAcquirer,
    classifier: ClassificationAdapter,
}

impl VideoAnalyzer {
    pub fn new(page: Arc<dyn PageSurface>, acquirer: TranscriptAcquirer, classifier: ClassificationAdapter) -> Self {
        Self {
            page,
            acquirer,
            classifier,
        }
    }

    pub fn page(&self) -> &Arc<dyn PageSurface> {
        &self.page
    }

    async fn eligible_video(&self) -> Result<VideoId, AnalysisError> {
        let location = self.page.location().await;
        if !is_watch_location(&location) {
            return Err(AnalysisError::NotVideoPage);
        }
        VideoId::from_location(&location).ok_or(AnalysisError::MissingVideoId)
    }

    async fn element_text(&self, selector: &str) -> String {
        self.page
            .query_text(selector)
            .await
            .map(|t| t.trim().to_string())
            .unwrap_or_default()
    }

    /// Run only the strategy chain; ineligible pages yield `Failure`
    pub async fn acquire(&self) -> AcquisitionResult {
        match self.eligible_video().await {
            Ok(video_id) => self.acquirer.acquire(&video_id, self.page.as_ref()).await,
            Err(e) => AcquisitionResult::Failure { reason: e.to_string() },
        }
    }

    /// Acquire the transcript and classify it. A degraded (title-only)
    /// transcript is still classified.
    pub async fn analyze(&self, api_key: &str) -> Result<AnalysisReport, AnalysisError> {
        let video_id = self.eligible_video().await?;
        tracing::info!("Processing video ID: {}", video_id);

        let title = self.element_text(selectors::VIDEO_TITLE).await;
        let description = self.element_text(selectors::VIDEO_DESCRIPTION).await;

        let acquisition = self.acquirer.acquire(&video_id, self.page.as_ref()).await;
        tracing::info!(
            "Transcript acquired ({}), length: {}",
            acquisition.label(),
            acquisition.text().chars().count()
        );

        let verdict = self
            .classifier
            .classify(api_key, &title, &description, acquisition.text())
            .await?;

        Ok(AnalysisReport::new(video_id, title, acquisition, verdict))
    }
}
