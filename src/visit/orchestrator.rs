//! The visit orchestrator: the state machine that owns "the current
//! navigation".
//!
//! Exactly one visit may be active at a time. Starting a new one
//! synchronously interrupts the previous visit — its token flips and its
//! cancel/finish hooks run before the new visit's `before` hook — so a late
//! response can never overwrite state set by its successor. Deferred-prop
//! sub-requests and prefetch fetches are the only concurrent in-flight
//! requests, and each re-validates against the current state before
//! applying its result.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use crate::adapter::{SwapRequest, ViewAdapter};
use crate::config::{Config, ConfigError};
use crate::error::VisitError;
use crate::history::{HistoryEncryption, HistorySlots, HistoryStore, InMemorySlots};
use crate::page::{Page, PageHandle};
use crate::prefetch::{BeginOutcome, PrefetchCache, PrefetchHit, RequestSignature};
use crate::props::path::{self as prop_path, PropMutation};
use crate::props::{reconcile, OncePropStore, ReconcileOptions};
use crate::scroll::{NullScrollView, ScrollPositionStore, ScrollView};
use crate::transport::headers::{assemble, CookieSource, NoCookies, ProtocolHeaders};
use crate::transport::query::merge_query;
use crate::transport::response::{classify, extract_errors, Classified};
use crate::transport::{Method, RequestBody, RequestSpec, ReqwestTransport, Transport};
use crate::visit::hooks::{CompletedVisit, PendingVisit, VisitConclusion, VisitHooks};
use crate::visit::options::{Preserve, VisitData, VisitOptions};
use crate::visit::token::CancellationToken;

/// Lifecycle state of one visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum VisitState {
    Pending = 0,
    Completed = 1,
    Cancelled = 2,
    Interrupted = 3,
}

/// Engine-level notifications for hosts and adapters.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    VisitStarted {
        id: Uuid,
        url: String,
    },
    VisitFinished {
        id: Uuid,
    },
    /// Asset version drift; the host decides whether to hard-reload.
    VersionMismatch {
        known: Option<String>,
        incoming: Option<String>,
        url: String,
    },
    /// Non-Inertia response, for a diagnostic overlay.
    InvalidResponse {
        status: u16,
        url: String,
    },
    /// Fall back to a full non-SPA navigation.
    LocationRedirect {
        url: String,
    },
    /// A history entry degraded to URL-only under storage quota.
    HistoryDegraded {
        url: String,
    },
}

/// The platform pieces the engine runs against. Every browser dependency is
/// behind a trait so the engine works headless.
pub struct Platform {
    pub transport: Arc<dyn Transport>,
    pub slots: Arc<dyn HistorySlots>,
    pub encryption: Option<Arc<dyn HistoryEncryption>>,
    pub scroll: Arc<dyn ScrollView>,
    pub cookies: Arc<dyn CookieSource>,
    pub adapter: Arc<dyn ViewAdapter>,
}

impl Platform {
    /// Reqwest transport with in-memory stand-ins for the platform pieces;
    /// hosts replace the ones their environment actually provides.
    pub fn new(config: &Config, adapter: Arc<dyn ViewAdapter>) -> Self {
        Self {
            transport: Arc::new(ReqwestTransport::new(&config.transport)),
            slots: Arc::new(InMemorySlots::new()),
            encryption: None,
            scroll: Arc::new(NullScrollView),
            cookies: Arc::new(NoCookies),
            adapter,
        }
    }
}

struct VisitShared {
    hooks: VisitHooks,
    state: AtomicU8,
    finished: AtomicBool,
    conclude: Mutex<Option<oneshot::Sender<VisitConclusion>>>,
}

impl VisitShared {
    fn new(hooks: VisitHooks, conclude: oneshot::Sender<VisitConclusion>) -> Self {
        Self {
            hooks,
            state: AtomicU8::new(VisitState::Pending as u8),
            finished: AtomicBool::new(false),
            conclude: Mutex::new(Some(conclude)),
        }
    }

    fn set_state(&self, state: VisitState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn state(&self) -> VisitState {
        match self.state.load(Ordering::SeqCst) {
            0 => VisitState::Pending,
            1 => VisitState::Completed,
            2 => VisitState::Cancelled,
            _ => VisitState::Interrupted,
        }
    }

    /// Deliver `finish` and the conclusion exactly once.
    fn finish(&self, conclusion: VisitConclusion) {
        if self.finished.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(hook) = &self.hooks.on_finish {
            hook(&conclusion);
        }
        if let Some(tx) = self.conclude.lock().take() {
            let _ = tx.send(conclusion);
        }
    }

    /// Superseded or explicitly cancelled: cancel hook, then finish.
    fn interrupt(&self, state: VisitState) {
        if self.finished.load(Ordering::SeqCst) {
            return;
        }
        self.set_state(state);
        if let Some(hook) = &self.hooks.on_cancel {
            hook();
        }
        self.finish(VisitConclusion::Cancelled);
    }
}

struct ActiveVisit {
    id: Uuid,
    token: CancellationToken,
    shared: Arc<VisitShared>,
}

struct DeferredHandle {
    id: Uuid,
    /// Normalized destination the group belongs to.
    destination: String,
    token: CancellationToken,
}

/// Handle on an issued visit.
pub struct VisitHandle {
    pub id: Uuid,
    shared: Arc<VisitShared>,
    conclusion: oneshot::Receiver<VisitConclusion>,
}

impl VisitHandle {
    pub fn state(&self) -> VisitState {
        self.shared.state()
    }

    /// Await the visit's conclusion.
    pub async fn conclusion(self) -> VisitConclusion {
        self.conclusion.await.unwrap_or(VisitConclusion::Cancelled)
    }
}

impl fmt::Debug for VisitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitHandle")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

/// Options for client-only prop mutations.
#[derive(Debug, Clone, Default)]
pub struct MutateOptions {
    /// Follow the mutation with a partial reload.
    pub reload: bool,
    /// Fields for that reload; defaults to the mutated prop's root.
    pub only: Vec<String>,
}

struct Applied {
    page: Page,
    completed: CompletedVisit,
}

enum PerformError {
    Cancelled,
    Location(String),
    Visit(VisitError),
}

/// The engine facade. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Navigator {
    inner: Arc<NavigatorInner>,
}

struct NavigatorInner {
    config: Config,
    transport: Arc<dyn Transport>,
    adapter: Arc<dyn ViewAdapter>,
    cookies: Arc<dyn CookieSource>,
    page: PageHandle,
    once: OncePropStore,
    prefetch: PrefetchCache,
    history: HistoryStore,
    scroll: ScrollPositionStore,
    active: Mutex<Option<ActiveVisit>>,
    deferred: Mutex<Vec<DeferredHandle>>,
    version: Mutex<Option<String>>,
    in_background: AtomicBool,
    events: broadcast::Sender<EngineEvent>,
}

impl Navigator {
    pub fn new(
        config: Config,
        platform: Platform,
        initial_page: Page,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let version = initial_page
            .version
            .clone()
            .or_else(|| config.protocol.version.clone());
        let history = HistoryStore::new(
            platform.slots,
            platform.encryption,
            config.history.encrypt,
        );
        let scroll = ScrollPositionStore::new(platform.scroll);
        let page = PageHandle::new();
        page.set(initial_page);
        let (events, _) = broadcast::channel(256);
        Ok(Self {
            inner: Arc::new(NavigatorInner {
                config,
                transport: platform.transport,
                adapter: platform.adapter,
                cookies: platform.cookies,
                page,
                once: OncePropStore::new(),
                prefetch: PrefetchCache::new(),
                history,
                scroll,
                active: Mutex::new(None),
                deferred: Mutex::new(Vec::new()),
                version: Mutex::new(version),
                in_background: AtomicBool::new(false),
                events,
            }),
        })
    }

    /// Mount the initial page: capture its once props, swap it in, seed the
    /// first history entry and start its deferred groups.
    pub async fn init(&self) -> Result<(), VisitError> {
        let Some(page) = self.inner.page.get() else {
            return Ok(());
        };
        for (name, meta) in &page.once_props {
            if let Some(value) = page.props.get(name) {
                let key = meta.key.as_deref().unwrap_or(name);
                self.inner
                    .once
                    .store(key, value.clone(), meta.ttl_ms.map(Duration::from_millis));
            }
        }
        self.resolve_and_swap(&page, false).await?;
        self.inner.history.replace(&page);
        self.spawn_deferred(&page);
        tracing::info!(component = %page.component, url = %page.url, "engine initialized");
        Ok(())
    }

    /// Start a visit. Supersedes any pending visit synchronously.
    pub fn visit(&self, url: impl Into<String>, options: VisitOptions) -> VisitHandle {
        let url = url.into();
        let id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        let shared = Arc::new(VisitShared::new(options.hooks.clone(), tx));
        let pending = PendingVisit {
            id,
            url: url.clone(),
            method: options.method,
        };
        let handle = VisitHandle {
            id,
            shared: shared.clone(),
            conclusion: rx,
        };

        // Interrupt the previous visit before this one's `before` hook: no
        // window exists where two visits are simultaneously active.
        let previous = self.inner.active.lock().take();
        if let Some(previous) = previous {
            previous.token.cancel();
            previous.shared.interrupt(VisitState::Interrupted);
            tracing::debug!(visit = %previous.id, "visit interrupted");
        }
        let destination = self.normalize_destination(&url);
        self.cancel_deferred_except(&destination);

        if let Some(before) = &shared.hooks.on_before {
            if !before(&pending) {
                // Aborted before anything started: no further hooks fire.
                shared.set_state(VisitState::Cancelled);
                shared.finished.store(true, Ordering::SeqCst);
                if let Some(tx) = shared.conclude.lock().take() {
                    let _ = tx.send(VisitConclusion::Cancelled);
                }
                tracing::debug!(url = %url, "visit aborted by before hook");
                return handle;
            }
        }

        let token = CancellationToken::new();
        *self.inner.active.lock() = Some(ActiveVisit {
            id,
            token: token.clone(),
            shared: shared.clone(),
        });

        if let Some(start) = &shared.hooks.on_start {
            start(&pending);
        }
        let _ = self.inner.events.send(EngineEvent::VisitStarted {
            id,
            url: url.clone(),
        });
        tracing::debug!(visit = %id, url = %url, method = %options.method, "visit started");

        let navigator = self.clone();
        tokio::spawn(async move {
            navigator.drive_visit(id, url, options, token, shared).await;
        });
        handle
    }

    pub fn get(&self, url: impl Into<String>, options: VisitOptions) -> VisitHandle {
        self.visit(
            url,
            VisitOptions {
                method: Method::Get,
                ..options
            },
        )
    }

    pub fn post(&self, url: impl Into<String>, data: Value, options: VisitOptions) -> VisitHandle {
        self.visit(
            url,
            VisitOptions {
                method: Method::Post,
                data: VisitData::Json(data),
                ..options
            },
        )
    }

    pub fn put(&self, url: impl Into<String>, data: Value, options: VisitOptions) -> VisitHandle {
        self.visit(
            url,
            VisitOptions {
                method: Method::Put,
                data: VisitData::Json(data),
                ..options
            },
        )
    }

    pub fn patch(&self, url: impl Into<String>, data: Value, options: VisitOptions) -> VisitHandle {
        self.visit(
            url,
            VisitOptions {
                method: Method::Patch,
                data: VisitData::Json(data),
                ..options
            },
        )
    }

    pub fn delete(&self, url: impl Into<String>, options: VisitOptions) -> VisitHandle {
        self.visit(
            url,
            VisitOptions {
                method: Method::Delete,
                ..options
            },
        )
    }

    /// Re-visit the current URL. Options are usually built from
    /// [`VisitOptions::reload`]. `None` when no page is mounted yet.
    pub fn reload(&self, options: VisitOptions) -> Option<VisitHandle> {
        let url = self.inner.page.url()?;
        Some(self.visit(url, options))
    }

    /// Cancel the currently pending visit, if any.
    pub fn cancel(&self) {
        let previous = self.inner.active.lock().take();
        if let Some(previous) = previous {
            previous.token.cancel();
            previous.shared.interrupt(VisitState::Cancelled);
            tracing::debug!(visit = %previous.id, "visit cancelled");
        }
    }

    /// Speculatively fetch a GET destination into the prefetch cache.
    pub fn prefetch(
        &self,
        url: impl Into<String>,
        options: VisitOptions,
        cache_for: Option<Duration>,
    ) {
        let url = url.into();
        if !options.method.is_get() {
            tracing::warn!(url = %url, method = %options.method, "only GET visits can be prefetched");
            return;
        }
        let Ok((spec, _)) = self.build_request(&url, &options) else {
            tracing::warn!(url = %url, "prefetch request could not be built");
            return;
        };
        let signature = RequestSignature::get(&spec.url);
        let cache_for =
            cache_for.unwrap_or(Duration::from_millis(self.inner.config.prefetch.cache_for_ms));
        let BeginOutcome::Started(_) = self.inner.prefetch.begin(signature.clone(), cache_for)
        else {
            return;
        };
        tracing::debug!(url = %spec.url, "prefetch started");
        let navigator = self.clone();
        tokio::spawn(async move {
            let result = navigator.inner.transport.send(spec, None).await;
            match result.map(|response| classify(&response)) {
                Ok(Classified::Page(page)) => {
                    navigator.inner.prefetch.complete(&signature, *page);
                }
                Ok(_) | Err(_) => {
                    tracing::debug!("prefetch failed");
                    navigator.inner.prefetch.fail(&signature);
                }
            }
        });
    }

    /// Client-only replacement of a prop, write-through to history and any
    /// cached prefetch snapshots.
    pub fn replace_prop(&self, path: &str, value: Value, options: MutateOptions) -> bool {
        self.mutate_prop(path, PropMutation::Replace(value), options)
    }

    /// Client-only prepend into an array prop.
    pub fn prepend_to_prop(&self, path: &str, value: Value, options: MutateOptions) -> bool {
        self.mutate_prop(path, PropMutation::Prepend(value), options)
    }

    /// Persist caller state into the current history entry.
    pub fn remember(&self, key: &str, value: Value) {
        let updated = self.inner.page.update(|page| {
            page.remembered_state.insert(key.to_string(), value.clone());
        });
        if updated {
            if let Some(page) = self.inner.page.get() {
                self.inner.history.replace(&page);
            }
        }
    }

    /// Read back remembered caller state.
    pub fn restored(&self, key: &str) -> Option<Value> {
        self.inner.page.get()?.remembered_state.get(key).cloned()
    }

    /// Handle a back/forward navigation by `delta` entries.
    pub async fn navigate_history(&self, delta: isize) -> HistoryOutcome {
        let Some(entry) = self.inner.history.go(delta) else {
            return HistoryOutcome::AtEdge;
        };
        // A back/forward wins over any pending visit.
        self.cancel();
        self.cancel_deferred_except(&self.normalize_destination(&entry.url));

        let Some(mut page) = entry.page else {
            tracing::debug!(url = %entry.url, "thin history entry, refetching");
            return HistoryOutcome::Refetching(self.visit(entry.url, VisitOptions::default()));
        };

        // Once props revalidate on every swap.
        let mut stale_once = Vec::new();
        let metas: Vec<(String, Option<String>)> = page
            .once_props
            .iter()
            .map(|(name, meta)| (name.clone(), meta.key.clone()))
            .collect();
        for (name, key) in metas {
            let key = key.unwrap_or_else(|| name.clone());
            match self.inner.once.fresh(&key) {
                Some(value) => {
                    page.props.insert(name, value);
                }
                None => {
                    page.props.remove(&name);
                    stale_once.push(name);
                }
            }
        }
        stale_once.sort();

        if let Err(err) = self.resolve_and_swap(&page, false).await {
            tracing::warn!(component = %page.component, error = %err, "history restore failed, refetching");
            return HistoryOutcome::Refetching(self.visit(entry.url, VisitOptions::default()));
        }
        self.inner.scroll.restore(&page);
        tracing::debug!(url = %page.url, "history entry restored");
        HistoryOutcome::Restored {
            url: page.url,
            stale_once,
        }
    }

    /// Mark the host application backgrounded; pollers throttle accordingly.
    pub fn set_in_background(&self, value: bool) {
        self.inner.in_background.store(value, Ordering::SeqCst);
    }

    pub fn in_background(&self) -> bool {
        self.inner.in_background.load(Ordering::SeqCst)
    }

    /// The shared current-page cell adapters subscribe to.
    pub fn page(&self) -> PageHandle {
        self.inner.page.clone()
    }

    pub fn history(&self) -> HistoryStore {
        self.inner.history.clone()
    }

    pub fn prefetch_cache(&self) -> PrefetchCache {
        self.inner.prefetch.clone()
    }

    pub fn once_props(&self) -> OncePropStore {
        self.inner.once.clone()
    }

    /// Known asset version.
    pub fn version(&self) -> Option<String> {
        self.inner.version.lock().clone()
    }

    /// Subscribe to engine events.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn config(&self) -> &Config {
        &self.inner.config
    }

    async fn drive_visit(
        self,
        id: Uuid,
        url: String,
        options: VisitOptions,
        token: CancellationToken,
        shared: Arc<VisitShared>,
    ) {
        // Save where we are before navigating away.
        self.save_scroll_positions();

        match self.perform(id, &url, &options, &token).await {
            Ok(applied) => {
                match &applied.completed.validation_errors {
                    Some(errors) => {
                        let err = VisitError::Validation {
                            bag: options.error_bag.clone(),
                            errors: errors.clone(),
                        };
                        if let Some(hook) = &shared.hooks.on_error {
                            hook(&err);
                        }
                    }
                    None => {
                        if let Some(hook) = &shared.hooks.on_success {
                            hook(&applied.page);
                        }
                    }
                }
                shared.set_state(VisitState::Completed);
                shared.finish(VisitConclusion::Completed(applied.completed));
            }
            Err(PerformError::Cancelled) => {
                // The superseding caller already delivered the cancel hook;
                // finish() is a no-op in that case.
                shared.finish(VisitConclusion::Cancelled);
            }
            Err(PerformError::Location(location)) => {
                let _ = self.inner.events.send(EngineEvent::LocationRedirect {
                    url: location.clone(),
                });
                tracing::info!(url = %location, "location response, deferring to full navigation");
                shared.set_state(VisitState::Completed);
                shared.finish(VisitConclusion::LocationRedirect { url: location });
            }
            Err(PerformError::Visit(err)) => {
                if let VisitError::InvalidResponse { status, .. } = &err {
                    let _ = self.inner.events.send(EngineEvent::InvalidResponse {
                        status: *status,
                        url: url.clone(),
                    });
                }
                tracing::warn!(visit = %id, error = %err, "visit failed");
                if let Some(hook) = &shared.hooks.on_error {
                    hook(&err);
                }
                shared.set_state(VisitState::Completed);
                shared.finish(VisitConclusion::Failed(err));
            }
        }

        let _ = self.inner.events.send(EngineEvent::VisitFinished { id });
        let mut active = self.inner.active.lock();
        if active.as_ref().is_some_and(|a| a.id == id) {
            *active = None;
        }
    }

    async fn perform(
        &self,
        id: Uuid,
        url: &str,
        options: &VisitOptions,
        token: &CancellationToken,
    ) -> Result<Applied, PerformError> {
        let (spec, fragment) = self
            .build_request(url, options)
            .map_err(PerformError::Visit)?;
        let incoming = self.acquire_response(&spec, options, token).await?;
        self.ensure_current(id, token)?;

        // Version drift is surfaced, never auto-resolved.
        let known = self.inner.version.lock().clone();
        let version_mismatch =
            matches!((&known, &incoming.version), (Some(k), Some(v)) if k != v);
        if version_mismatch {
            tracing::warn!(
                known = known.as_deref().unwrap_or_default(),
                incoming = incoming.version.as_deref().unwrap_or_default(),
                "asset version changed"
            );
            let _ = self.inner.events.send(EngineEvent::VersionMismatch {
                known: known.clone(),
                incoming: incoming.version.clone(),
                url: incoming.url.clone(),
            });
        } else if known.is_none() {
            *self.inner.version.lock() = incoming.version.clone();
        }

        // Flags resolve against the response page.
        let preserve_scroll = options.preserve_scroll.resolve(&incoming);
        let preserve_state = options.preserve_state.resolve(&incoming);

        let current = self.inner.page.get();
        let outcome = reconcile(
            current.as_ref(),
            incoming,
            &self.inner.once,
            &ReconcileOptions { preserve_state },
        );
        let page = outcome.page;

        self.inner
            .adapter
            .resolve(&page.component)
            .await
            .map_err(|err| {
                PerformError::Visit(VisitError::Component {
                    component: page.component.clone(),
                    message: err.message,
                })
            })?;
        // Resolution awaited; make sure nothing superseded us meanwhile.
        self.ensure_current(id, token)?;

        self.inner.page.set(page.clone());
        if page.clear_history {
            self.inner.history.clear();
        }
        let same_url = current.as_ref().is_some_and(|c| c.url == page.url);
        let persisted = if options.replace || same_url {
            self.inner.history.replace(&page)
        } else {
            self.inner.history.push(&page)
        };
        if persisted.thin {
            let _ = self.inner.events.send(EngineEvent::HistoryDegraded {
                url: page.url.clone(),
            });
        }

        self.inner
            .adapter
            .swap(SwapRequest {
                component: page.component.clone(),
                page: page.clone(),
                preserve_state,
            })
            .await
            .map_err(|err| {
                PerformError::Visit(VisitError::Component {
                    component: page.component.clone(),
                    message: err.message,
                })
            })?;

        if !preserve_scroll {
            let fragment = fragment.or_else(|| page.fragment().map(str::to_string));
            self.inner.scroll.reset_or_anchor(fragment.as_deref());
        }

        self.spawn_deferred(&page);

        let errors = extract_errors(&page, options.error_bag.as_deref());
        let completed = CompletedVisit {
            component: page.component.clone(),
            url: page.url.clone(),
            preserve_scroll,
            preserve_state,
            version_mismatch,
            stale_once: outcome.stale_once,
            validation_errors: (!errors.is_empty()).then_some(errors),
        };
        Ok(Applied { page, completed })
    }

    async fn acquire_response(
        &self,
        spec: &RequestSpec,
        options: &VisitOptions,
        token: &CancellationToken,
    ) -> Result<Page, PerformError> {
        if spec.method.is_get() {
            let signature = RequestSignature::get(&spec.url);
            match self.inner.prefetch.lookup(&signature) {
                Some(PrefetchHit::Ready(page)) => {
                    tracing::debug!(url = %spec.url, "serving visit from prefetch cache");
                    return Ok(page);
                }
                Some(PrefetchHit::InFlight(request)) => {
                    tracing::debug!(url = %spec.url, "awaiting in-flight prefetch");
                    tokio::select! {
                        _ = token.cancelled() => return Err(PerformError::Cancelled),
                        result = request.wait() => {
                            if let Some(page) = result {
                                return Ok(page);
                            }
                            // Failed prefetch: fall through to a live request.
                        }
                    }
                }
                None => {}
            }
        }

        let progress = options.hooks.on_progress.clone();
        let response = tokio::select! {
            _ = token.cancelled() => return Err(PerformError::Cancelled),
            result = self.inner.transport.send(spec.clone(), progress) => {
                result.map_err(|err| PerformError::Visit(err.into()))?
            }
        };
        match classify(&response) {
            Classified::Page(page) => Ok(*page),
            Classified::Location { url } => Err(PerformError::Location(url)),
            Classified::Invalid {
                status,
                content_type,
            } => Err(PerformError::Visit(VisitError::InvalidResponse {
                status,
                content_type,
            })),
        }
    }

    fn spawn_deferred(&self, page: &Page) {
        if page.deferred_props.is_empty() {
            return;
        }
        let destination = self.normalize_destination(&page.url);
        for (group, fields) in &page.deferred_props {
            let handle_id = Uuid::new_v4();
            let token = CancellationToken::new();
            self.inner.deferred.lock().push(DeferredHandle {
                id: handle_id,
                destination: destination.clone(),
                token: token.clone(),
            });
            let navigator = self.clone();
            let group = group.clone();
            let fields = fields.clone();
            let url = page.url.clone();
            tokio::spawn(async move {
                navigator
                    .drive_deferred(handle_id, url, group, fields, token)
                    .await;
            });
        }
    }

    async fn drive_deferred(
        self,
        handle_id: Uuid,
        url: String,
        group: String,
        fields: Vec<String>,
        token: CancellationToken,
    ) {
        let options = VisitOptions {
            only: fields,
            preserve_state: Preserve::Yes,
            ..Default::default()
        };
        let merged: Option<()> = async {
            let (spec, _) = self.build_request(&url, &options).ok()?;
            let response = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(group = %group, "deferred group cancelled");
                    return None;
                }
                result = self.inner.transport.send(spec, None) => match result {
                    Ok(response) => response,
                    Err(err) => {
                        tracing::warn!(group = %group, error = %err, "deferred group request failed");
                        return None;
                    }
                }
            };
            let incoming = match classify(&response) {
                Classified::Page(page) => *page,
                _ => {
                    tracing::warn!(group = %group, "deferred group got a non-page response");
                    return None;
                }
            };
            // A late success must never merge after its owner was
            // superseded or the component changed.
            if token.is_cancelled() {
                return None;
            }
            let current = self.inner.page.get()?;
            if current.component != incoming.component {
                return None;
            }
            let outcome = reconcile(
                Some(&current),
                incoming,
                &self.inner.once,
                &ReconcileOptions {
                    preserve_state: true,
                },
            );
            self.inner.page.set(outcome.page.clone());
            self.inner.history.replace(&outcome.page);
            tracing::debug!(group = %group, "deferred group merged");
            Some(())
        }
        .await;
        let _ = merged;
        self.inner.deferred.lock().retain(|h| h.id != handle_id);
    }

    /// Cancel deferred sub-requests headed anywhere but `destination`.
    fn cancel_deferred_except(&self, destination: &str) {
        let mut handles = self.inner.deferred.lock();
        handles.retain(|handle| {
            if handle.destination == destination {
                true
            } else {
                handle.token.cancel();
                false
            }
        });
    }

    fn mutate_prop(&self, path: &str, mutation: PropMutation, options: MutateOptions) -> bool {
        let mut applied = false;
        self.inner.page.update(|page| {
            applied = prop_path::apply_mutation(&mut page.props, path, &mutation);
        });
        if !applied {
            return false;
        }
        if let Some(page) = self.inner.page.get() {
            self.inner.history.replace(&page);
        }
        self.inner.prefetch.apply_mutation(path, &mutation);
        if options.reload {
            let only = if options.only.is_empty() {
                vec![path.split('.').next().unwrap_or(path).to_string()]
            } else {
                options.only
            };
            let _ = self.reload(VisitOptions::reload().with_only(only));
        }
        true
    }

    async fn resolve_and_swap(&self, page: &Page, preserve_state: bool) -> Result<(), VisitError> {
        self.inner
            .adapter
            .resolve(&page.component)
            .await
            .map_err(|err| VisitError::Component {
                component: page.component.clone(),
                message: err.message,
            })?;
        self.inner.page.set(page.clone());
        self.inner
            .adapter
            .swap(SwapRequest {
                component: page.component.clone(),
                page: page.clone(),
                preserve_state,
            })
            .await
            .map_err(|err| VisitError::Component {
                component: page.component.clone(),
                message: err.message,
            })
    }

    fn save_scroll_positions(&self) {
        let updated = self
            .inner
            .page
            .update(|page| self.inner.scroll.save(page));
        if updated {
            if let Some(page) = self.inner.page.get() {
                self.inner.history.replace(&page);
            }
        }
    }

    fn ensure_current(&self, id: Uuid, token: &CancellationToken) -> Result<(), PerformError> {
        if token.is_cancelled() {
            return Err(PerformError::Cancelled);
        }
        let active = self.inner.active.lock();
        if active.as_ref().is_some_and(|a| a.id == id) {
            Ok(())
        } else {
            Err(PerformError::Cancelled)
        }
    }

    fn build_request(
        &self,
        url: &str,
        options: &VisitOptions,
    ) -> Result<(RequestSpec, Option<String>), VisitError> {
        let mut resolved = self.resolve_url(url)?;
        let fragment = resolved.fragment().map(str::to_string);
        resolved.set_fragment(None);

        let array_format = options
            .array_format
            .unwrap_or(self.inner.config.protocol.array_format);
        let mut body = None;
        match &options.data {
            VisitData::None => {}
            VisitData::Json(value) => {
                if options.method.is_get() {
                    let map = value.as_object().ok_or_else(|| VisitError::Transport {
                        message: "query data must be a JSON object".to_string(),
                    })?;
                    merge_query(&mut resolved, map, array_format);
                } else {
                    body = Some(RequestBody::Json(value.clone()));
                }
            }
            VisitData::Raw {
                content_type,
                bytes,
            } => {
                body = Some(RequestBody::Raw {
                    content_type: content_type.clone(),
                    bytes: bytes.clone(),
                });
            }
        }

        let version = self.inner.version.lock().clone();
        let partial_component = if options.only.is_empty() && options.except.is_empty() {
            None
        } else {
            self.inner.page.component()
        };
        let protocol = ProtocolHeaders {
            version: version.as_deref(),
            partial_component: partial_component.as_deref(),
            only: &options.only,
            except: &options.except,
            error_bag: options.error_bag.as_deref(),
        };
        let headers = assemble(&options.headers, &protocol, self.inner.cookies.as_ref());

        Ok((
            RequestSpec {
                method: options.method,
                url: resolved.to_string(),
                headers,
                body,
            },
            fragment,
        ))
    }

    fn resolve_url(&self, url: &str) -> Result<Url, VisitError> {
        let base =
            Url::parse(&self.inner.config.protocol.base_url).map_err(|err| {
                VisitError::Transport {
                    message: format!("invalid base URL: {err}"),
                }
            })?;
        base.join(url).map_err(|err| VisitError::Transport {
            message: format!("invalid URL '{url}': {err}"),
        })
    }

    fn normalize_destination(&self, url: &str) -> String {
        match self.resolve_url(url) {
            Ok(mut resolved) => {
                resolved.set_fragment(None);
                resolved.to_string()
            }
            Err(_) => url.to_string(),
        }
    }
}

/// Result of a back/forward navigation.
#[derive(Debug)]
pub enum HistoryOutcome {
    /// The stored page was swapped back in and scroll restored.
    Restored {
        url: String,
        stale_once: Vec<String>,
    },
    /// The entry was thin (or unrestorable); a network visit was started.
    Refetching(VisitHandle),
    /// No entry in that direction.
    AtEdge,
}
