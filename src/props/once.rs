//! Client-side store for props persisted across navigations.
//!
//! A once prop lives here from the first response that includes it and is
//! re-attached to every later page whose manifest names it, until its TTL
//! elapses. A stale value is treated as absent — it is reported so a
//! consumer can refetch it, never silently reused.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde_json::Value;

struct OnceEntry {
    value: Value,
    ttl: Option<Duration>,
    last_fetched_at: Instant,
}

impl OnceEntry {
    fn is_fresh(&self) -> bool {
        match self.ttl {
            Some(ttl) => self.last_fetched_at.elapsed() < ttl,
            None => true,
        }
    }
}

/// Engine-global once-prop store. Cheap to clone, shared across visits.
#[derive(Clone)]
pub struct OncePropStore {
    inner: Arc<RwLock<HashMap<String, OnceEntry>>>,
}

impl OncePropStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or refresh a value, resetting its freshness clock.
    pub fn store(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut entries = self.inner.write();
        entries.insert(
            key.to_string(),
            OnceEntry {
                value,
                ttl,
                last_fetched_at: Instant::now(),
            },
        );
    }

    /// The stored value, if present and within its TTL.
    pub fn fresh(&self, key: &str) -> Option<Value> {
        let entries = self.inner.read();
        let entry = entries.get(key)?;
        entry.is_fresh().then(|| entry.value.clone())
    }

    /// True when a value exists but has outlived its TTL.
    pub fn is_stale(&self, key: &str) -> bool {
        let entries = self.inner.read();
        entries.get(key).is_some_and(|entry| !entry.is_fresh())
    }

    pub fn remove(&self, key: &str) -> bool {
        self.inner.write().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.inner.write().clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

impl Default for OncePropStore {
    fn default() -> Self {
        Self::new()
    }
}
