//! The page data model and the shared current-page handle.
//!
//! A [`Page`] is the unit of navigable state: the component to render, its
//! props, the server-confirmed URL, and the reconciliation manifest the
//! server attaches (merge strategies, deferred groups, once props). The
//! [`PageHandle`] is the single shared "current page" cell; adapters
//! subscribe to it instead of reading ambient global state.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;

/// Prop name → arbitrary JSON value, preserving insertion order.
pub type Props = serde_json::Map<String, Value>;

/// Scroll offset of one tracked region, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub top: i32,
    pub left: i32,
}

/// Server manifest entry for a prop persisted across navigations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OncePropMeta {
    /// Store key; defaults to the prop name when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Freshness window in milliseconds. `None` means the value never goes stale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_ms: Option<u64>,
}

/// The unit of navigable state, shaped exactly as the server ships it.
///
/// `scroll_regions` and `remembered_state` are client-owned: they default to
/// empty on wire deserialization and only round-trip through history
/// serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    /// Identifier of the view to render.
    pub component: String,
    #[serde(default)]
    pub props: Props,
    /// Canonical, server-confirmed URL. May include a fragment.
    pub url: String,
    /// Opaque asset-version token.
    #[serde(default)]
    pub version: Option<String>,
    /// Server asked the client to drop persisted history payloads.
    #[serde(default, skip_serializing_if = "is_false")]
    pub clear_history: bool,
    /// Server asked for this entry to be stored encrypted.
    #[serde(default, skip_serializing_if = "is_false")]
    pub encrypt_history: bool,
    /// Prop paths merged shallowly instead of replaced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub merge_props: Vec<String>,
    /// Prop paths merged recursively.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deep_merge_props: Vec<String>,
    /// `path.key` selectors for identity-keyed array merges.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_props_on: Vec<String>,
    /// Deferred group name → prop names fetched after the initial response.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub deferred_props: HashMap<String, Vec<String>>,
    /// Once-prop manifest. Values may be withheld from `props` and are then
    /// re-attached from the client-side once store.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub once_props: HashMap<String, OncePropMeta>,
    /// Saved offsets, index-aligned with tracked regions at save time.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scroll_regions: Vec<ScrollOffset>,
    /// Caller-persisted state, independent namespace from `props`.
    #[serde(default, skip_serializing_if = "Props::is_empty")]
    pub remembered_state: Props,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Page {
    /// Minimal page with empty props and no manifest.
    pub fn new(component: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            props: Props::new(),
            url: url.into(),
            version: None,
            clear_history: false,
            encrypt_history: false,
            merge_props: Vec::new(),
            deep_merge_props: Vec::new(),
            match_props_on: Vec::new(),
            deferred_props: HashMap::new(),
            once_props: HashMap::new(),
            scroll_regions: Vec::new(),
            remembered_state: Props::new(),
        }
    }

    /// Fragment identifier of the page URL, without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.url.split_once('#').map(|(_, frag)| frag).filter(|f| !f.is_empty())
    }

    /// URL with any fragment stripped, for request-signature purposes.
    pub fn url_without_fragment(&self) -> &str {
        self.url.split_once('#').map_or(self.url.as_str(), |(base, _)| base)
    }

    /// Look up a prop by dotted path, e.g. `"users.data"`.
    pub fn prop(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut current = self.props.get(first)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }
}

/// Shared current-page cell with change subscription.
///
/// Cheap to clone; every clone observes the same page. Subscribers get a
/// `watch` receiver that yields on every swap, which is the seam framework
/// adapters hang their reactivity glue on.
#[derive(Clone)]
pub struct PageHandle {
    tx: Arc<watch::Sender<Option<Page>>>,
}

impl PageHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Clone of the current page, if one has been set.
    pub fn get(&self) -> Option<Page> {
        self.tx.borrow().clone()
    }

    pub fn component(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|p| p.component.clone())
    }

    pub fn url(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|p| p.url.clone())
    }

    /// Replace the current page and notify subscribers.
    pub fn set(&self, page: Page) {
        self.tx.send_replace(Some(page));
    }

    /// Mutate the current page in place. Returns `false` when no page is set.
    pub fn update(&self, f: impl FnOnce(&mut Page)) -> bool {
        let mut applied = false;
        self.tx.send_if_modified(|slot| {
            if let Some(page) = slot.as_mut() {
                f(page);
                applied = true;
            }
            applied
        });
        applied
    }

    /// Subscribe to page swaps. The receiver sees the current value immediately.
    pub fn subscribe(&self) -> watch::Receiver<Option<Page>> {
        self.tx.subscribe()
    }
}

impl Default for PageHandle {
    fn default() -> Self {
        Self::new()
    }
}
