use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;

use super::{ChannelError, PageChannel, PageRequest};
use crate::page::PageSurface;
use crate::pipeline::{SettingsStore, SideEffectExecutor, VideoAnalyzer};
use crate::watcher::{PageWatcher, Readiness};

/// Page-resident logic that serves acquisition requests.
///
/// One acquisition runs at a time: concurrent requests queue on the
/// pending-operation guard instead of starting a second run.
pub struct Responder {
    analyzer: VideoAnalyzer,
    watcher: Arc<PageWatcher>,
    settings: Arc<dyn SettingsStore>,
    executor: Arc<dyn SideEffectExecutor>,
    pending: Mutex<()>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Responder {
    pub fn new(
        analyzer: VideoAnalyzer,
        watcher: PageWatcher,
        settings: Arc<dyn SettingsStore>,
        executor: Arc<dyn SideEffectExecutor>,
    ) -> Self {
        Self {
            analyzer,
            watcher: Arc::new(watcher),
            settings,
            executor,
            pending: Mutex::new(()),
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn page(&self) -> &Arc<dyn PageSurface> {
        self.analyzer.page()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle);
    }

    /// Answer one request with its JSON reply
    pub async fn handle(self: &Arc<Self>, request: PageRequest) -> Value {
        match request {
            PageRequest::CheckVideo => {
                let responder = Arc::clone(self);
                self.track(tokio::spawn(async move { responder.check_video().await }));
                json!({ "status": "checking" })
            }
            PageRequest::GetTranscript { api_key } => {
                tracing::info!("Manual transcript request received");
                let _pending = self.pending.lock().await;
                match self.analyzer.analyze(&api_key).await {
                    Ok(report) => serde_json::to_value(&report)
                        .unwrap_or_else(|e| json!({ "error": e.to_string() })),
                    Err(e) => {
                        tracing::error!("Error processing transcript: {}", e);
                        json!({ "error": e.to_string() })
                    }
                }
            }
        }
    }

    /// Wait for the page to become ready, then run an automatic pass
    pub async fn check_video(&self) {
        if let Some(Readiness::Ready { .. }) = self.watcher.check(self.page().as_ref()).await {
            self.automatic_pass().await;
        }
    }

    /// Acquire, classify and hand the report to the side-effect executor,
    /// using the stored settings
    pub async fn automatic_pass(&self) {
        if !self.settings.enabled() {
            tracing::debug!("Automatic classification disabled");
            return;
        }
        let Some(api_key) = self.settings.api_key() else {
            tracing::info!("No API key found. Set one in the configuration to classify videos.");
            return;
        };

        let _pending = self.pending.lock().await;
        match self.analyzer.analyze(&api_key).await {
            Ok(report) => self.executor.apply(&report).await,
            Err(e) => tracing::error!("Automatic analysis failed: {}", e),
        }
    }

    /// Follow client-side navigations and run an automatic pass whenever a
    /// video page becomes ready
    pub fn spawn_watch(self: &Arc<Self>) {
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = Arc::clone(&self.watcher);
        self.track(tokio::spawn(watcher.run(Arc::clone(self.page()), tx)));

        let responder = Arc::clone(self);
        self.track(tokio::spawn(async move {
            while let Some(readiness) = rx.recv().await {
                if let Readiness::Ready { location } = readiness {
                    tracing::info!("Video page ready: {}", location);
                    responder.automatic_pass().await;
                }
            }
        }));
    }

    /// Abort background work; the page context this responder lived in is gone
    pub fn shutdown(&self) {
        let mut tasks = self.tasks.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for task in tasks.drain(..) {
            task.abort();
        }
    }
}

/// Builds a responder for a freshly loaded page context
pub type ResponderFactory = Box<dyn Fn(Arc<dyn PageSurface>) -> Arc<Responder> + Send + Sync>;

/// In-process channel to a page's responder.
///
/// A reload tears down the current responder and attaches a new one built
/// by the factory, the way a page re-runs its scripts after reloading.
pub struct ResponderHost {
    page: Arc<dyn PageSurface>,
    factory: ResponderFactory,
    current: RwLock<Option<Arc<Responder>>>,
}

impl ResponderHost {
    /// Host whose page already runs a responder
    pub fn attached(page: Arc<dyn PageSurface>, factory: ResponderFactory) -> Self {
        let responder = factory(Arc::clone(&page));
        Self {
            page,
            factory,
            current: RwLock::new(Some(responder)),
        }
    }

    /// Host whose page never loaded a responder; the first reload attaches one
    pub fn detached(page: Arc<dyn PageSurface>, factory: ResponderFactory) -> Self {
        Self {
            page,
            factory,
            current: RwLock::new(None),
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.current.read().await.is_some()
    }
}

#[async_trait]
impl PageChannel for ResponderHost {
    async fn send(&self, request: &PageRequest) -> Result<Option<Value>, ChannelError> {
        let responder = self
            .current
            .read()
            .await
            .clone()
            .ok_or(ChannelError::NoReceiver)?;
        Ok(Some(responder.handle(request.clone()).await))
    }

    async fn reload(&self) -> Result<(), ChannelError> {
        if let Some(previous) = self.current.write().await.take() {
            previous.shutdown();
        }

        self.page.reload().await?;

        let responder = (self.factory)(Arc::clone(&self.page));
        *self.current.write().await = Some(responder);
        tracing::debug!("Responder re-attached after reload");
        Ok(())
    }
}
