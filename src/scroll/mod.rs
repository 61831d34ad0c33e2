//! Scroll position tracking per history entry.
//!
//! Tracked regions are host-marked scrollable elements; the document is
//! always region zero. The host supplies a [`ScrollView`] so the engine
//! never touches a DOM directly.

use std::sync::Arc;

use crate::page::{Page, ScrollOffset};

/// Host-side view of the tracked scrollable regions.
pub trait ScrollView: Send + Sync {
    /// Number of tracked regions currently mounted, document included.
    fn region_count(&self) -> usize;

    /// Current offsets, index-aligned with the tracked regions.
    fn offsets(&self) -> Vec<ScrollOffset>;

    fn set_offset(&self, index: usize, offset: ScrollOffset);

    /// Scroll to the anchor for `fragment`; `false` when nothing matches.
    fn scroll_to_fragment(&self, fragment: &str) -> bool;
}

/// View for headless hosts: a document that never scrolls.
pub struct NullScrollView;

impl ScrollView for NullScrollView {
    fn region_count(&self) -> usize {
        1
    }

    fn offsets(&self) -> Vec<ScrollOffset> {
        vec![ScrollOffset::default()]
    }

    fn set_offset(&self, _index: usize, _offset: ScrollOffset) {}

    fn scroll_to_fragment(&self, _fragment: &str) -> bool {
        false
    }
}

/// Records and restores per-entry scroll offsets.
pub struct ScrollPositionStore {
    view: Arc<dyn ScrollView>,
}

impl ScrollPositionStore {
    pub fn new(view: Arc<dyn ScrollView>) -> Self {
        Self { view }
    }

    /// Capture current offsets into the page about to be persisted.
    pub fn save(&self, page: &mut Page) {
        page.scroll_regions = self.view.offsets();
    }

    /// Re-apply saved offsets by index. Saved offsets beyond the current
    /// region count are ignored rather than an error: the tracked set can
    /// shrink between save and restore.
    pub fn restore(&self, page: &Page) {
        let count = self.view.region_count();
        for (index, offset) in page.scroll_regions.iter().enumerate() {
            if index >= count {
                break;
            }
            self.view.set_offset(index, *offset);
        }
    }

    /// Zero every tracked region.
    pub fn reset(&self) {
        for index in 0..self.view.region_count() {
            self.view.set_offset(index, ScrollOffset::default());
        }
    }

    /// Forward-navigation behavior: with a fragment, try the anchor and
    /// leave offsets alone when it is missing; without one, reset.
    pub fn reset_or_anchor(&self, fragment: Option<&str>) {
        match fragment {
            Some(fragment) => {
                if !self.view.scroll_to_fragment(fragment) {
                    tracing::debug!(fragment, "no anchor match, leaving scroll untouched");
                }
            }
            None => self.reset(),
        }
    }
}
