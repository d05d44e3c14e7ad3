use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};

use super::selectors;
use super::{DomMutation, Fetch, PageError, PageSurface};
use crate::utils::markup_to_text;

fn meta_pattern(name: &'static str) -> Regex {
    Regex::new(&format!(r#"(?is)<meta[^>]*\bname="{name}"[^>]*\bcontent="([^"]*)""#))
        .expect("static meta pattern")
}

fn title_meta() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| meta_pattern("title"))
}

fn description_meta() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| meta_pattern("description"))
}

fn title_tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static title pattern"))
}

/// A watch page reconstructed from its fetched document.
///
/// There is no script runtime behind a snapshot: no globals, no interactive
/// elements, no mutations beyond the one emitted on reload. Title and
/// description are answered from the document's meta tags.
pub struct SnapshotPage {
    location: String,
    markup: RwLock<String>,
    fetcher: Arc<dyn Fetch>,
    mutations: broadcast::Sender<DomMutation>,
}

impl SnapshotPage {
    /// Fetch `location` and snapshot the returned document
    pub async fn load(fetcher: Arc<dyn Fetch>, location: &str) -> Result<Self, PageError> {
        let markup = Self::fetch_markup(fetcher.as_ref(), location).await?;
        Ok(Self::from_markup(fetcher, location, markup))
    }

    pub fn from_markup(fetcher: Arc<dyn Fetch>, location: &str, markup: String) -> Self {
        let (mutations, _) = broadcast::channel(8);
        Self {
            location: location.to_string(),
            markup: RwLock::new(markup),
            fetcher,
            mutations,
        }
    }

    async fn fetch_markup(fetcher: &dyn Fetch, location: &str) -> Result<String, PageError> {
        let fetched = fetcher.get_text(location).await?;
        if !fetched.is_success() {
            return Err(PageError::Status(fetched.status));
        }
        Ok(fetched.body)
    }

    fn extract(markup: &str, selector: &str) -> Option<String> {
        let found = match selector {
            selectors::VIDEO_TITLE => title_meta()
                .captures(markup)
                .or_else(|| title_tag().captures(markup))
                .map(|caps| caps[1].trim_end_matches(" - YouTube").to_string()),
            selectors::VIDEO_DESCRIPTION => description_meta()
                .captures(markup)
                .map(|caps| caps[1].to_string()),
            _ => None,
        };
        found.map(|raw| markup_to_text(&raw))
    }
}

#[async_trait]
impl PageSurface for SnapshotPage {
    async fn location(&self) -> String {
        self.location.clone()
    }

    async fn query_text(&self, selector: &str) -> Option<String> {
        Self::extract(&self.markup.read().await, selector)
    }

    async fn query_all_text(&self, selector: &str) -> Vec<String> {
        self.query_text(selector).await.into_iter().collect()
    }

    async fn click(&self, _selector: &str) -> bool {
        false
    }

    async fn click_containing(&self, _selector: &str, _label: &str) -> bool {
        false
    }

    async fn dismiss_menus(&self) {}

    async fn global_json(&self, _name: &str) -> Option<Value> {
        None
    }

    async fn document_markup(&self) -> String {
        self.markup.read().await.clone()
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<DomMutation> {
        self.mutations.subscribe()
    }

    async fn reload(&self) -> Result<(), PageError> {
        tracing::debug!("Reloading snapshot of {}", self.location);
        let markup = Self::fetch_markup(self.fetcher.as_ref(), &self.location).await?;
        *self.markup.write().await = markup;
        let _ = self.mutations.send(DomMutation);
        Ok(())
    }
}
