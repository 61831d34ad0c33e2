//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

pub mod mock_server;

use std::sync::Arc;

use parking_lot::Mutex;

use inertia_core::adapter::{AdapterError, SwapRequest, ViewAdapter};
use inertia_core::config::Config;
use inertia_core::history::InMemorySlots;
use inertia_core::page::{Page, ScrollOffset};
use inertia_core::scroll::ScrollView;
use inertia_core::transport::headers::NoCookies;
use inertia_core::transport::{BoxFuture, ReqwestTransport};
use inertia_core::{Navigator, Platform};

use self::mock_server::MockServer;

/// Adapter that records every resolve and swap.
pub struct RecordingAdapter {
    pub resolved: Mutex<Vec<String>>,
    pub swaps: Mutex<Vec<SwapRequest>>,
}

impl RecordingAdapter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            resolved: Mutex::new(Vec::new()),
            swaps: Mutex::new(Vec::new()),
        })
    }

    pub fn swap_count(&self) -> usize {
        self.swaps.lock().len()
    }

    pub fn last_swap(&self) -> Option<SwapRequest> {
        self.swaps.lock().last().cloned()
    }

    pub fn swapped_components(&self) -> Vec<String> {
        self.swaps.lock().iter().map(|s| s.component.clone()).collect()
    }
}

impl ViewAdapter for RecordingAdapter {
    fn resolve<'a>(&'a self, component: &'a str) -> BoxFuture<'a, Result<(), AdapterError>> {
        self.resolved.lock().push(component.to_string());
        Box::pin(async { Ok(()) })
    }

    fn swap(&self, request: SwapRequest) -> BoxFuture<'_, Result<(), AdapterError>> {
        self.swaps.lock().push(request);
        Box::pin(async { Ok(()) })
    }
}

/// Scroll view with real offsets and configurable anchors.
pub struct TrackingScrollView {
    offsets: Mutex<Vec<ScrollOffset>>,
    anchors: Mutex<Vec<String>>,
    pub jumps: Mutex<Vec<String>>,
}

impl TrackingScrollView {
    pub fn with_regions(count: usize) -> Arc<Self> {
        Arc::new(Self {
            offsets: Mutex::new(vec![ScrollOffset::default(); count]),
            anchors: Mutex::new(Vec::new()),
            jumps: Mutex::new(Vec::new()),
        })
    }

    pub fn add_anchor(&self, anchor: &str) {
        self.anchors.lock().push(anchor.to_string());
    }

    pub fn scroll_to(&self, index: usize, top: i32, left: i32) {
        self.offsets.lock()[index] = ScrollOffset { top, left };
    }

    pub fn current_offsets(&self) -> Vec<ScrollOffset> {
        self.offsets.lock().clone()
    }
}

impl ScrollView for TrackingScrollView {
    fn region_count(&self) -> usize {
        self.offsets.lock().len()
    }

    fn offsets(&self) -> Vec<ScrollOffset> {
        self.offsets.lock().clone()
    }

    fn set_offset(&self, index: usize, offset: ScrollOffset) {
        let mut offsets = self.offsets.lock();
        if index < offsets.len() {
            offsets[index] = offset;
        }
    }

    fn scroll_to_fragment(&self, fragment: &str) -> bool {
        let matched = self.anchors.lock().iter().any(|a| a == fragment);
        if matched {
            self.jumps.lock().push(fragment.to_string());
        }
        matched
    }
}

/// A navigator wired to the mock server with recording collaborators.
pub struct TestHost {
    pub navigator: Navigator,
    pub adapter: Arc<RecordingAdapter>,
    pub scroll: Arc<TrackingScrollView>,
    pub slots: Arc<InMemorySlots>,
}

pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.protocol.base_url = base_url.to_string();
    config
}

/// Host against `server` with the given initial page, already initialized.
pub async fn host_with(server: &MockServer, initial: Page) -> TestHost {
    host_with_config(test_config(&server.base_url()), initial).await
}

pub async fn host_with_config(config: Config, initial: Page) -> TestHost {
    host_with_parts(config, initial, Arc::new(InMemorySlots::new()), 1).await
}

pub async fn host_with_parts(
    config: Config,
    initial: Page,
    slots: Arc<InMemorySlots>,
    scroll_regions: usize,
) -> TestHost {
    let adapter = RecordingAdapter::new();
    let scroll = TrackingScrollView::with_regions(scroll_regions);
    let platform = Platform {
        transport: Arc::new(ReqwestTransport::new(&config.transport)),
        slots: slots.clone(),
        encryption: None,
        scroll: scroll.clone(),
        cookies: Arc::new(NoCookies),
        adapter: adapter.clone(),
    };
    let navigator = Navigator::new(config, platform, initial).expect("navigator config");
    navigator.init().await.expect("initial swap");
    TestHost {
        navigator,
        adapter,
        scroll,
        slots,
    }
}

/// Default starting page for tests.
pub fn home_page() -> Page {
    Page::new("Home", "/")
}

/// Wait for the first engine event matching `predicate`.
pub async fn wait_for_event(
    rx: &mut tokio::sync::broadcast::Receiver<inertia_core::EngineEvent>,
    predicate: impl Fn(&inertia_core::EngineEvent) -> bool,
) -> inertia_core::EngineEvent {
    loop {
        let event = tokio::time::timeout(std::time::Duration::from_secs(2), rx.recv())
            .await
            .expect("timed out waiting for engine event")
            .expect("event channel closed");
        if predicate(&event) {
            return event;
        }
    }
}
