//! Time-bounded cache of completed or in-flight visit responses.
//!
//! Entries are keyed by request signature. A navigation that arrives while
//! its prefetch is still in flight awaits the same request instead of
//! issuing a duplicate. Expiry is strict: `cache_for` is the hard ceiling
//! for an entry regardless of any once-prop TTL inside the cached page.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Notify;

use crate::page::Page;
use crate::props::path::{self as prop_path, PropMutation};
use crate::transport::Method;

/// Cache key: method, resolved URL, canonicalized request data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestSignature {
    method: Method,
    url: String,
    data: String,
}

impl RequestSignature {
    pub fn new(method: Method, url: &str, data: Option<&Value>) -> Self {
        Self {
            method,
            url: url.to_string(),
            data: data.map(canonical).unwrap_or_default(),
        }
    }

    pub fn get(url: &str) -> Self {
        Self::new(Method::Get, url, None)
    }
}

/// Key-order-independent serialization so `{a,b}` and `{b,a}` collide.
fn canonical(value: &Value) -> String {
    serde_json::to_string(&sorted(value)).unwrap_or_default()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let ordered: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, sorted(v))).collect();
            let mut out = serde_json::Map::new();
            for (key, val) in ordered {
                out.insert(key.clone(), val);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Shared slot for a request still on the wire. Waiters block on it and all
/// observe the same result; `None` means the fetch failed or was dropped.
pub struct InFlightRequest {
    done: Notify,
    result: Mutex<Option<Option<Page>>>,
}

impl InFlightRequest {
    fn new() -> Self {
        Self {
            done: Notify::new(),
            result: Mutex::new(None),
        }
    }

    pub async fn wait(&self) -> Option<Page> {
        loop {
            // Subscribe before checking so a resolve() between the check and
            // the await cannot be missed.
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(result) = self.result.lock().clone() {
                return result;
            }
            notified.await;
        }
    }

    fn resolve(&self, result: Option<Page>) {
        *self.result.lock() = Some(result);
        self.done.notify_waiters();
    }
}

enum EntryState {
    InFlight(Arc<InFlightRequest>),
    Ready(Page),
}

struct Entry {
    state: EntryState,
    cached_at: Instant,
    cache_for: Duration,
}

impl Entry {
    fn expired(&self) -> bool {
        matches!(self.state, EntryState::Ready(_)) && self.cached_at.elapsed() > self.cache_for
    }
}

/// A cache lookup result.
pub enum PrefetchHit {
    Ready(Page),
    InFlight(Arc<InFlightRequest>),
}

/// Outcome of registering a prefetch intent.
pub enum BeginOutcome {
    /// A fresh or in-flight entry already covers this signature.
    AlreadyUsable,
    /// Caller owns the fetch and must `complete` or `fail` it.
    Started(Arc<InFlightRequest>),
}

/// Shared prefetch cache. Cheap to clone.
#[derive(Clone)]
pub struct PrefetchCache {
    inner: Arc<Mutex<HashMap<RequestSignature, Entry>>>,
}

impl PrefetchCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// A usable entry for the signature, sweeping expired ones.
    pub fn lookup(&self, signature: &RequestSignature) -> Option<PrefetchHit> {
        let mut entries = self.inner.lock();
        entries.retain(|_, entry| !entry.expired());
        entries.get(signature).map(|entry| match &entry.state {
            EntryState::Ready(page) => PrefetchHit::Ready(page.clone()),
            EntryState::InFlight(request) => PrefetchHit::InFlight(request.clone()),
        })
    }

    /// Register intent to fetch. Returns `Started` exactly once per live
    /// signature; concurrent callers get `AlreadyUsable` and share the result.
    pub fn begin(&self, signature: RequestSignature, cache_for: Duration) -> BeginOutcome {
        let mut entries = self.inner.lock();
        if let Some(existing) = entries.get(&signature) {
            if !existing.expired() {
                return BeginOutcome::AlreadyUsable;
            }
        }
        let request = Arc::new(InFlightRequest::new());
        entries.insert(
            signature,
            Entry {
                state: EntryState::InFlight(request.clone()),
                cached_at: Instant::now(),
                cache_for,
            },
        );
        BeginOutcome::Started(request)
    }

    /// Store the fetched page and wake every waiter. The TTL clock starts
    /// now, not at `begin` time.
    pub fn complete(&self, signature: &RequestSignature, page: Page) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.get_mut(signature) {
            if let EntryState::InFlight(request) = &entry.state {
                request.resolve(Some(page.clone()));
            }
            entry.state = EntryState::Ready(page);
            entry.cached_at = Instant::now();
        }
    }

    /// Drop the entry after a failed fetch, releasing waiters empty-handed.
    pub fn fail(&self, signature: &RequestSignature) {
        self.remove(signature);
    }

    pub fn invalidate(&self, signature: &RequestSignature) {
        self.remove(signature);
    }

    pub fn invalidate_all(&self) {
        let mut entries = self.inner.lock();
        for entry in entries.values() {
            if let EntryState::InFlight(request) = &entry.state {
                request.resolve(None);
            }
        }
        entries.clear();
    }

    /// Extend an entry's lifetime. Returns `false` for unknown signatures.
    pub fn touch(&self, signature: &RequestSignature, extend_by: Duration) -> bool {
        let mut entries = self.inner.lock();
        match entries.get_mut(signature) {
            Some(entry) => {
                entry.cache_for += extend_by;
                true
            }
            None => false,
        }
    }

    /// Propagate a client-only prop mutation into cached snapshots.
    ///
    /// Snapshots containing the mutated prop get the new value written
    /// through; ones where the write is not feasible are dropped so a stale
    /// snapshot is never served. Snapshots without the prop are untouched.
    pub fn apply_mutation(&self, path: &str, mutation: &PropMutation) {
        let root = path.split('.').next().unwrap_or(path);
        let mut entries = self.inner.lock();
        entries.retain(|_, entry| match &mut entry.state {
            EntryState::Ready(page) => {
                if !page.props.contains_key(root) {
                    return true;
                }
                prop_path::apply_mutation(&mut page.props, path, mutation)
            }
            EntryState::InFlight(_) => true,
        });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn remove(&self, signature: &RequestSignature) {
        let mut entries = self.inner.lock();
        if let Some(entry) = entries.remove(signature) {
            if let EntryState::InFlight(request) = entry.state {
                request.resolve(None);
            }
        }
    }
}

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new()
    }
}
