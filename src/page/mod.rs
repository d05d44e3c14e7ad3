use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

pub mod http;
pub mod memory;
pub mod snapshot;

pub use http::{Fetch, FetchError, FetchedBody, HttpFetcher};
pub use memory::MemoryPage;
pub use snapshot::SnapshotPage;

/// Element selectors on the host's watch page
pub mod selectors {
    /// Primary heading; doubles as the page-readiness anchor
    pub const VIDEO_TITLE: &str = "h1.title.style-scope.ytd-video-primary-info-renderer";
    pub const VIDEO_DESCRIPTION: &str = "ytd-expander.ytd-video-secondary-info-renderer";

    pub const TRANSCRIPT_PANEL_SEGMENTS: &str = "ytd-transcript-renderer ytd-transcript-segment-renderer";
    pub const SHOW_TRANSCRIPT_BUTTON: &str = "button[aria-label=\"Show transcript\"]";
    pub const SETTINGS_BUTTON: &str = "button.ytp-button.ytp-settings-button";
    pub const SETTINGS_MENU_ITEM: &str = "div.ytp-menuitem";
    pub const MORE_ACTIONS_BUTTON: &str = "button#expand";
    pub const MORE_ACTIONS_ITEM: &str = "tp-yt-paper-item";

    /// Alternate selectors for rendered transcript segments, tried in order
    pub const TRANSCRIPT_SEGMENTS: [&str; 4] = [
        "ytd-transcript-segment-renderer",
        ".ytd-transcript-segment-renderer",
        "ytd-transcript-body-renderer yt-formatted-string",
        "#transcript-scrollbox ytd-transcript-segment-renderer",
    ];

    /// Page-global holding the serialized player configuration
    pub const PLAYER_RESPONSE_GLOBAL: &str = "ytInitialPlayerResponse";
}

/// Notification that the document tree changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomMutation;

#[derive(thiserror::Error, Debug)]
pub enum PageError {
    #[error("page request failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("page returned HTTP {0}")]
    Status(u16),
}

/// The live host page as seen from page-resident logic.
///
/// Implementations answer element queries against whatever document the page
/// currently shows. Clicks report whether a matching element existed; the
/// effects of a click become visible through later queries.
#[async_trait]
pub trait PageSurface: Send + Sync {
    /// Current navigable location
    async fn location(&self) -> String;

    /// Text content of the first element matching `selector`
    async fn query_text(&self, selector: &str) -> Option<String>;

    /// Text content of every element matching `selector`, in document order
    async fn query_all_text(&self, selector: &str) -> Vec<String>;

    async fn click(&self, selector: &str) -> bool;

    /// Click the first element matching `selector` whose text contains `label`
    async fn click_containing(&self, selector: &str, label: &str) -> bool;

    /// Click on an empty area of the document to close open menus
    async fn dismiss_menus(&self);

    /// In-memory page global, if the page runtime exposes one under `name`
    async fn global_json(&self, name: &str) -> Option<Value>;

    /// Serialized markup of the whole document
    async fn document_markup(&self) -> String;

    fn subscribe_mutations(&self) -> broadcast::Receiver<DomMutation>;

    /// Full reload of the page, recreating its script context
    async fn reload(&self) -> Result<(), PageError>;
}
