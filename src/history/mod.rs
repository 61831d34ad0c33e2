//! The history store: serializes navigable state into per-entry slots and
//! mirrors the browser's back/forward stack.
//!
//! Every push/replace tries to persist the full page. When the backing
//! storage rejects the write for quota, the entry degrades to its URL only
//! ("thin") and a later back/forward landing on it must refetch from the
//! network. Degradation is silent toward the caller.

pub mod encryption;
pub mod storage;

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::page::Page;

pub use encryption::{EncryptionError, HistoryEncryption};
pub use storage::{HistorySlots, InMemorySlots, StorageError};

/// On-disk shape of one slot.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredEntry {
    url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    page: Option<StoredPage>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "format", content = "data")]
enum StoredPage {
    Plain(Box<Page>),
    /// Base64 of the host-cipher output.
    Encrypted(String),
}

#[derive(Debug, Clone)]
struct EntryMeta {
    url: String,
    thin: bool,
}

/// Result of persisting one entry.
#[derive(Debug, Clone, Copy)]
pub struct PersistOutcome {
    /// The entry degraded to URL-only.
    pub thin: bool,
}

/// A history entry handed back on navigation. `page: None` means the entry
/// is thin and the page must be refetched.
#[derive(Debug, Clone)]
pub struct HistoryNavigation {
    pub url: String,
    pub page: Option<Page>,
}

#[derive(Default)]
struct StackState {
    entries: Vec<EntryMeta>,
    current: Option<usize>,
}

/// Browser-history mirror. Cheap to clone; clones share the stack.
#[derive(Clone)]
pub struct HistoryStore {
    inner: Arc<HistoryInner>,
}

struct HistoryInner {
    slots: Arc<dyn HistorySlots>,
    encryption: Option<Arc<dyn HistoryEncryption>>,
    encrypt_all: bool,
    state: Mutex<StackState>,
}

impl HistoryStore {
    pub fn new(
        slots: Arc<dyn HistorySlots>,
        encryption: Option<Arc<dyn HistoryEncryption>>,
        encrypt_all: bool,
    ) -> Self {
        Self {
            inner: Arc::new(HistoryInner {
                slots,
                encryption,
                encrypt_all,
                state: Mutex::new(StackState::default()),
            }),
        }
    }

    /// Append a new entry, discarding any forward entries.
    pub fn push(&self, page: &Page) -> PersistOutcome {
        let mut state = self.inner.state.lock();
        let index = state.current.map_or(0, |current| current + 1);
        state.entries.truncate(index);
        self.inner.slots.truncate(index);
        let outcome = self.write_entry(index, page);
        state.entries.push(EntryMeta {
            url: page.url.clone(),
            thin: outcome.thin,
        });
        state.current = Some(index);
        outcome
    }

    /// Overwrite the current entry (or seed the first one).
    pub fn replace(&self, page: &Page) -> PersistOutcome {
        let mut state = self.inner.state.lock();
        let index = state.current.unwrap_or(0);
        let outcome = self.write_entry(index, page);
        let meta = EntryMeta {
            url: page.url.clone(),
            thin: outcome.thin,
        };
        if index < state.entries.len() {
            state.entries[index] = meta;
        } else {
            state.entries.push(meta);
        }
        state.current = Some(index);
        outcome
    }

    /// The entry the stack currently points at.
    pub fn current(&self) -> Option<HistoryNavigation> {
        let (index, meta) = {
            let state = self.inner.state.lock();
            let index = state.current?;
            (index, state.entries.get(index)?.clone())
        };
        Some(self.load(index, &meta))
    }

    /// Move by `delta` entries (back/forward). `None` when out of range.
    pub fn go(&self, delta: isize) -> Option<HistoryNavigation> {
        let (target, meta) = {
            let mut state = self.inner.state.lock();
            let current = state.current? as isize;
            let target = current + delta;
            if target < 0 || target as usize >= state.entries.len() {
                return None;
            }
            let target = target as usize;
            state.current = Some(target);
            (target, state.entries[target].clone())
        };
        Some(self.load(target, &meta))
    }

    /// Strip persisted page payloads while keeping URLs, so later
    /// back/forward navigation refetches. Entries already thin from quota
    /// are left exactly as they are.
    pub fn clear(&self) {
        let mut state = self.inner.state.lock();
        for (index, meta) in state.entries.iter_mut().enumerate() {
            if meta.thin {
                continue;
            }
            let thin = StoredEntry {
                url: meta.url.clone(),
                page: None,
            };
            if let Ok(bytes) = serde_json::to_vec(&thin) {
                if let Err(err) = self.inner.slots.write(index, &bytes) {
                    tracing::warn!(error = %err, "failed to thin history entry");
                }
            }
            meta.thin = true;
        }
        tracing::debug!("history payloads cleared");
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Zero-based stack position of the current entry.
    pub fn position(&self) -> Option<usize> {
        self.inner.state.lock().current
    }

    fn write_entry(&self, index: usize, page: &Page) -> PersistOutcome {
        match self.encode(page) {
            Ok(bytes) => match self.inner.slots.write(index, &bytes) {
                Ok(()) => return PersistOutcome { thin: false },
                Err(StorageError::QuotaExceeded { needed, available }) => {
                    tracing::warn!(
                        url = %page.url,
                        needed,
                        available,
                        "history quota exceeded, degrading entry to url only"
                    );
                }
                Err(err) => {
                    tracing::warn!(url = %page.url, error = %err, "history write failed");
                }
            },
            Err(reason) => {
                tracing::warn!(url = %page.url, reason = %reason, "failed to encode history entry");
            }
        }

        let thin = StoredEntry {
            url: page.url.clone(),
            page: None,
        };
        if let Ok(bytes) = serde_json::to_vec(&thin) {
            if let Err(err) = self.inner.slots.write(index, &bytes) {
                tracing::warn!(error = %err, "thin history write failed");
            }
        }
        PersistOutcome { thin: true }
    }

    fn encode(&self, page: &Page) -> Result<Vec<u8>, String> {
        let stored = if self.inner.encrypt_all || page.encrypt_history {
            let cipher = self
                .inner
                .encryption
                .as_ref()
                .ok_or("encryption requested but no cipher configured")?;
            let plain = serde_json::to_vec(page).map_err(|e| e.to_string())?;
            let sealed = cipher.encrypt(&plain).map_err(|e| e.to_string())?;
            StoredPage::Encrypted(BASE64.encode(sealed))
        } else {
            StoredPage::Plain(Box::new(page.clone()))
        };
        serde_json::to_vec(&StoredEntry {
            url: page.url.clone(),
            page: Some(stored),
        })
        .map_err(|e| e.to_string())
    }

    fn load(&self, index: usize, meta: &EntryMeta) -> HistoryNavigation {
        let page = if meta.thin {
            None
        } else {
            self.inner
                .slots
                .read(index)
                .ok()
                .flatten()
                .and_then(|bytes| self.decode(&bytes))
        };
        HistoryNavigation {
            url: meta.url.clone(),
            page,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<Page> {
        let entry: StoredEntry = match serde_json::from_slice(bytes) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!(error = %err, "corrupt history entry, forcing refetch");
                return None;
            }
        };
        match entry.page? {
            StoredPage::Plain(page) => Some(*page),
            StoredPage::Encrypted(blob) => {
                let cipher = self.inner.encryption.as_ref()?;
                let sealed = BASE64.decode(blob).ok()?;
                match cipher.decrypt(&sealed) {
                    Ok(plain) => serde_json::from_slice(&plain).ok(),
                    Err(err) => {
                        tracing::warn!(error = %err, "history decryption failed, forcing refetch");
                        None
                    }
                }
            }
        }
    }
}
