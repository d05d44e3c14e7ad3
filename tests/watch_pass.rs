mod common;

use std::sync::Arc;

use common::{timed_text, RecordingBackend, RoutedFetcher};
use transcript_gate::acquisition::{AcquisitionResult, StrategyKind, TranscriptAcquirer};
use transcript_gate::classify::ClassificationAdapter;
use transcript_gate::config::Config;
use transcript_gate::page::{Fetch, PageSurface, SnapshotPage};
use transcript_gate::pipeline::{CollectingExecutor, VideoAnalyzer};
use transcript_gate::protocol::Responder;
use transcript_gate::watcher::PageWatcher;

const WATCH_PAGE: &str = r#"<html><head><title>Borrow checker deep dive - YouTube</title>
<meta name="title" content="Borrow checker deep dive"></head><body></body></html>"#;

async fn snapshot_responder(config: Config, backend: Arc<RecordingBackend>) -> (Responder, Arc<CollectingExecutor>) {
    let fetcher: Arc<dyn Fetch> = Arc::new(
        RoutedFetcher::default()
            .route("timedtext", 200, &timed_text(&["Lifetimes tie references to the data they borrow"]))
            .route("youtube.com/watch", 200, WATCH_PAGE),
    );
    let page: Arc<dyn PageSurface> = Arc::new(
        SnapshotPage::load(fetcher.clone(), "https://www.youtube.com/watch?v=abc123")
            .await
            .unwrap(),
    );
    let collector = Arc::new(CollectingExecutor::default());
    let responder = Responder::new(
        VideoAnalyzer::new(
            page,
            TranscriptAcquirer::new(fetcher, &config.acquisition),
            ClassificationAdapter::new(backend, config.classifier.clone()),
        ),
        PageWatcher::new(String::new(), config.watcher.anchor_timeout()),
        Arc::new(config),
        collector.clone(),
    );
    (responder, collector)
}

#[tokio::test(start_paused = true)]
async fn ready_snapshot_gets_one_automatic_pass() {
    let backend = RecordingBackend::replying("{\"isProductive\": true, \"reason\": \"systems programming\"}");
    let config = Config::default().with_api_key(Some("key".into()));
    let (responder, collector) = snapshot_responder(config, backend.clone()).await;

    responder.check_video().await;

    let reports = collector.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].title, "Borrow checker deep dive");
    assert!(matches!(
        reports[0].acquisition,
        AcquisitionResult::Success { source: StrategyKind::DirectTrack, .. }
    ));
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn stored_settings_gate_the_pass() {
    let backend = RecordingBackend::replying("{\"isProductive\": false, \"reason\": \"gaming\"}");
    let mut config = Config::default().with_api_key(Some("key".into()));
    config.classifier.enabled = false;
    let (responder, collector) = snapshot_responder(config, backend.clone()).await;

    responder.check_video().await;

    assert!(collector.reports().is_empty());
    assert!(backend.requests().is_empty());
}
