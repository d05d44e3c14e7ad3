use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;
use tokio::time::{timeout_at, Instant};

use crate::page::{selectors, PageSurface};
use crate::utils::is_watch_location;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Timeout waiting for element: {selector}")]
    Timeout { selector: String, waited: Duration },

    #[error("page context closed while waiting for element: {0}")]
    Closed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchPhase {
    /// Location is not a video detail page
    Idle,
    Watching,
}

/// Last location seen by the watcher; lives as long as the page context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherState {
    pub last_known_location: String,
}

/// Outcome of one transition into `Watching`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { location: String },
    /// The anchor never appeared; skip this page instance
    Skipped { location: String, reason: WatchError },
}

/// Wait, without polling, until `selector` matches an element.
///
/// The element is re-queried on every DOM mutation until `timeout` elapses.
pub async fn wait_for_element(page: &dyn PageSurface, selector: &str, timeout: Duration) -> Result<String, WatchError> {
    let mut mutations = page.subscribe_mutations();
    if let Some(text) = page.query_text(selector).await {
        return Ok(text);
    }

    let deadline = Instant::now() + timeout;
    loop {
        match timeout_at(deadline, mutations.recv()).await {
            Err(_) => {
                return Err(WatchError::Timeout {
                    selector: selector.to_string(),
                    waited: timeout,
                })
            }
            Ok(Ok(_)) | Ok(Err(RecvError::Lagged(_))) => {
                if let Some(text) = page.query_text(selector).await {
                    return Ok(text);
                }
            }
            Ok(Err(RecvError::Closed)) => return Err(WatchError::Closed(selector.to_string())),
        }
    }
}

/// Detects client-side navigations and gates acquisition on page readiness.
///
/// Full reloads recreate the page context and with it a fresh watcher, so
/// the state here is never reset mid-life.
pub struct PageWatcher {
    state: Mutex<(WatcherState, WatchPhase)>,
    anchor_selector: String,
    anchor_timeout: Duration,
}

impl PageWatcher {
    pub fn new(initial_location: impl Into<String>, anchor_timeout: Duration) -> Self {
        Self {
            state: Mutex::new((
                WatcherState {
                    last_known_location: initial_location.into(),
                },
                WatchPhase::Idle,
            )),
            anchor_selector: selectors::VIDEO_TITLE.to_string(),
            anchor_timeout,
        }
    }

    pub fn phase(&self) -> WatchPhase {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1
    }

    pub fn state(&self) -> WatcherState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).0.clone()
    }

    /// Record `location`; returns whether it differs from the last one seen
    pub fn record_location(&self, location: &str) -> bool {
        let mut guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.0.last_known_location == location {
            return false;
        }
        guard.0.last_known_location = location.to_string();
        true
    }

    fn enter_phase(&self, location: &str) -> WatchPhase {
        let phase = if is_watch_location(location) {
            WatchPhase::Watching
        } else {
            WatchPhase::Idle
        };
        self.state.lock().unwrap_or_else(PoisonError::into_inner).1 = phase;
        phase
    }

    /// Evaluate the page's current location, waiting for the anchor when it
    /// is a video page. `None` when the location is not eligible.
    pub async fn check(&self, page: &dyn PageSurface) -> Option<Readiness> {
        let location = page.location().await;
        self.record_location(&location);

        if self.enter_phase(&location) == WatchPhase::Idle {
            tracing::debug!("Not a video page: {}", location);
            return None;
        }

        tracing::debug!("Video page detected, waiting for {}", self.anchor_selector);
        match wait_for_element(page, &self.anchor_selector, self.anchor_timeout).await {
            Ok(_) => Some(Readiness::Ready { location }),
            Err(reason) => {
                tracing::warn!("Skipping {}: {}", location, reason);
                Some(Readiness::Skipped { location, reason })
            }
        }
    }

    /// Handle one DOM mutation: only a changed location triggers a check
    pub async fn on_mutation(&self, page: &dyn PageSurface) -> Option<Readiness> {
        let location = page.location().await;
        if !self.record_location(&location) {
            return None;
        }
        tracing::info!("URL changed, checking for video...");
        self.check(page).await
    }

    /// Check the current page, then follow navigations until the page
    /// context closes or the receiver goes away.
    pub async fn run(self: Arc<Self>, page: Arc<dyn PageSurface>, readiness: mpsc::Sender<Readiness>) {
        let mut mutations = page.subscribe_mutations();

        if let Some(event) = self.check(page.as_ref()).await {
            if readiness.send(event).await.is_err() {
                return;
            }
        }

        loop {
            match mutations.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if let Some(event) = self.on_mutation(page.as_ref()).await {
                        if readiness.send(event).await.is_err() {
                            return;
                        }
                    }
                }
                Err(RecvError::Closed) => return,
            }
        }
    }
}
