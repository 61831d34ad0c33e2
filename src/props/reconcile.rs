//! Reconciles an incoming server response into the current page state.

use std::time::Duration;

use crate::page::Page;
use crate::props::merge::{merge_props, MergeManifest};
use crate::props::once::OncePropStore;

/// Visit-level inputs the reconcile pass needs, already resolved to values.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Keep the current page's remembered state across the swap.
    pub preserve_state: bool,
}

/// Result of a reconcile pass.
#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub page: Page,
    /// Once props the manifest named whose cached value had expired.
    /// They are absent from the page; the consumer decides how to refetch.
    pub stale_once: Vec<String>,
}

/// Produce the next page from the current one and a server response.
///
/// Partial responses are additive over the last known state for the same
/// component; navigating to a different component discards retained props.
/// Once-prop values withheld by the server are re-attached from the store
/// while fresh, and values the server did include refresh the store.
pub fn reconcile(
    current: Option<&Page>,
    incoming: Page,
    once: &OncePropStore,
    options: &ReconcileOptions,
) -> ReconcileOutcome {
    let same_component = current.is_some_and(|c| c.component == incoming.component);
    let manifest = MergeManifest::from_page(&incoming);

    let mut props = match current {
        Some(current_page) if same_component => {
            merge_props(&current_page.props, &incoming.props, &manifest)
        }
        _ => incoming.props.clone(),
    };

    let mut stale_once = Vec::new();
    for (name, meta) in &incoming.once_props {
        let key = meta.key.as_deref().unwrap_or(name);
        if let Some(value) = incoming.props.get(name) {
            once.store(key, value.clone(), meta.ttl_ms.map(Duration::from_millis));
            props.insert(name.clone(), value.clone());
        } else if let Some(value) = once.fresh(key) {
            props.insert(name.clone(), value);
        } else {
            // Expired or never seen: leave the prop absent rather than
            // synthesize it.
            props.remove(name);
            stale_once.push(name.clone());
        }
    }
    stale_once.sort();

    let remembered_state = match current {
        Some(current_page) if same_component && options.preserve_state => {
            current_page.remembered_state.clone()
        }
        _ => incoming.remembered_state.clone(),
    };

    let page = Page {
        props,
        remembered_state,
        // Offsets are saved by the scroll store at navigation time.
        scroll_regions: Vec::new(),
        ..incoming
    };

    ReconcileOutcome { page, stale_once }
}
