use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};

use super::{DomMutation, PageError, PageSurface};

/// Elements revealed when a matching click lands
#[derive(Debug, Clone)]
struct ClickReaction {
    selector: String,
    label: Option<String>,
    reveal_selector: String,
    reveal_texts: Vec<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    location: String,
    elements: HashMap<String, Vec<String>>,
    globals: HashMap<String, Value>,
    markup: String,
    reactions: Vec<ClickReaction>,
    clicks: Vec<String>,
}

/// Scriptable in-memory page.
///
/// Elements are keyed by the exact selector string callers query with. Click
/// reactions model host UI that renders new elements after a button or menu
/// entry is activated. Every change to the element set or location is
/// broadcast as a [`DomMutation`].
pub struct MemoryPage {
    state: Mutex<MemoryState>,
    mutations: broadcast::Sender<DomMutation>,
    reloads: AtomicUsize,
}

impl MemoryPage {
    pub fn new(location: impl Into<String>) -> Self {
        let (mutations, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(MemoryState {
                location: location.into(),
                ..MemoryState::default()
            }),
            mutations,
            reloads: AtomicUsize::new(0),
        }
    }

    fn notify(&self) {
        // no subscribers is fine
        let _ = self.mutations.send(DomMutation);
    }

    /// Client-side navigation to a new location
    pub async fn navigate(&self, location: impl Into<String>) {
        self.state.lock().await.location = location.into();
        self.notify();
    }

    pub async fn set_element(&self, selector: impl Into<String>, text: impl Into<String>) {
        self.set_elements(selector, vec![text.into()]).await;
    }

    pub async fn set_elements(&self, selector: impl Into<String>, texts: Vec<String>) {
        self.state.lock().await.elements.insert(selector.into(), texts);
        self.notify();
    }

    pub async fn set_global(&self, name: impl Into<String>, value: Value) {
        self.state.lock().await.globals.insert(name.into(), value);
    }

    pub async fn set_markup(&self, markup: impl Into<String>) {
        self.state.lock().await.markup = markup.into();
    }

    /// Reveal `reveal_selector` with `texts` once `selector` is clicked
    pub async fn on_click(&self, selector: &str, reveal_selector: &str, texts: Vec<String>) {
        self.state.lock().await.reactions.push(ClickReaction {
            selector: selector.to_string(),
            label: None,
            reveal_selector: reveal_selector.to_string(),
            reveal_texts: texts,
        });
    }

    /// Reveal `reveal_selector` once the `selector` entry labelled `label` is clicked
    pub async fn on_menu_item(&self, selector: &str, label: &str, reveal_selector: &str, texts: Vec<String>) {
        self.state.lock().await.reactions.push(ClickReaction {
            selector: selector.to_string(),
            label: Some(label.to_string()),
            reveal_selector: reveal_selector.to_string(),
            reveal_texts: texts,
        });
    }

    /// Selectors clicked so far, in order; menu dismissals appear as `body`
    pub async fn clicks(&self) -> Vec<String> {
        self.state.lock().await.clicks.clone()
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    fn apply_reactions(state: &mut MemoryState, selector: &str, label: Option<&str>) -> bool {
        let revealed: Vec<ClickReaction> = state
            .reactions
            .iter()
            .filter(|r| r.selector == selector && r.label.as_deref() == label)
            .cloned()
            .collect();

        for reaction in &revealed {
            state
                .elements
                .insert(reaction.reveal_selector.clone(), reaction.reveal_texts.clone());
        }
        !revealed.is_empty()
    }
}

#[async_trait]
impl PageSurface for MemoryPage {
    async fn location(&self) -> String {
        self.state.lock().await.location.clone()
    }

    async fn query_text(&self, selector: &str) -> Option<String> {
        self.state
            .lock()
            .await
            .elements
            .get(selector)
            .and_then(|texts| texts.first().cloned())
    }

    async fn query_all_text(&self, selector: &str) -> Vec<String> {
        self.state
            .lock()
            .await
            .elements
            .get(selector)
            .cloned()
            .unwrap_or_default()
    }

    async fn click(&self, selector: &str) -> bool {
        let changed = {
            let mut state = self.state.lock().await;
            let present = state.elements.get(selector).is_some_and(|texts| !texts.is_empty());
            if !present {
                return false;
            }
            state.clicks.push(selector.to_string());
            Self::apply_reactions(&mut state, selector, None)
        };
        if changed {
            self.notify();
        }
        true
    }

    async fn click_containing(&self, selector: &str, label: &str) -> bool {
        let changed = {
            let mut state = self.state.lock().await;
            let present = state
                .elements
                .get(selector)
                .is_some_and(|texts| texts.iter().any(|text| text.contains(label)));
            if !present {
                return false;
            }
            state.clicks.push(format!("{selector} >> {label}"));
            Self::apply_reactions(&mut state, selector, Some(label))
        };
        if changed {
            self.notify();
        }
        true
    }

    async fn dismiss_menus(&self) {
        self.state.lock().await.clicks.push("body".to_string());
    }

    async fn global_json(&self, name: &str) -> Option<Value> {
        self.state.lock().await.globals.get(name).cloned()
    }

    async fn document_markup(&self) -> String {
        self.state.lock().await.markup.clone()
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<DomMutation> {
        self.mutations.subscribe()
    }

    async fn reload(&self) -> Result<(), PageError> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        self.notify();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn click_reveals_elements_and_notifies() {
        let page = MemoryPage::new("https://www.youtube.com/watch?v=abc");
        page.set_element("button#open", "Open").await;
        page.on_click("button#open", "div.panel", vec!["one".into(), "two".into()]).await;

        let mut rx = page.subscribe_mutations();
        assert!(page.click("button#open").await);
        assert_eq!(rx.recv().await.unwrap(), DomMutation);
        assert_eq!(page.query_all_text("div.panel").await, vec!["one", "two"]);
        assert_eq!(page.clicks().await, vec!["button#open"]);
    }

    #[tokio::test]
    async fn click_on_missing_element_fails() {
        let page = MemoryPage::new("about:blank");
        assert!(!page.click("button#missing").await);
        assert!(page.clicks().await.is_empty());
    }

    #[tokio::test]
    async fn menu_item_matches_by_label() {
        let page = MemoryPage::new("about:blank");
        page.set_elements("div.item", vec!["Quality".into(), "Open transcript".into()]).await;
        page.on_menu_item("div.item", "Transcript", "div.panel", vec!["text".into()]).await;

        assert!(!page.click_containing("div.item", "Speed").await);
        assert!(page.click_containing("div.item", "Transcript").await);
        assert_eq!(page.query_text("div.panel").await.as_deref(), Some("text"));
    }
}
