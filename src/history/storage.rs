//! Injectable slot storage backing the history stack.
//!
//! Browser `History.state` size limits are platform-specific, so the store
//! writes through this fallible interface and quota behavior can be
//! simulated deterministically in tests.

use parking_lot::Mutex;
use thiserror::Error;

/// Errors a storage backend can report.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The write would exceed the platform quota. The history store reacts
    /// by degrading the entry, never by surfacing this to the caller.
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    #[error("storage failure: {message}")]
    Backend { message: String },
}

/// One byte slot per history entry, indexed by stack position.
pub trait HistorySlots: Send + Sync {
    fn write(&self, index: usize, bytes: &[u8]) -> Result<(), StorageError>;

    fn read(&self, index: usize) -> Result<Option<Vec<u8>>, StorageError>;

    /// Drop every slot at `len` and beyond (forward entries discarded on a
    /// push after back-navigation).
    fn truncate(&self, len: usize);
}

/// In-memory slots with an optional cumulative byte quota.
pub struct InMemorySlots {
    quota: Option<usize>,
    slots: Mutex<Vec<Option<Vec<u8>>>>,
}

impl InMemorySlots {
    pub fn new() -> Self {
        Self {
            quota: None,
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Storage refusing writes once live slots exceed `bytes` in total.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            slots: Mutex::new(Vec::new()),
        }
    }

    /// Total bytes currently stored, for assertions.
    pub fn used(&self) -> usize {
        self.slots
            .lock()
            .iter()
            .flatten()
            .map(|bytes| bytes.len())
            .sum()
    }
}

impl Default for InMemorySlots {
    fn default() -> Self {
        Self::new()
    }
}

impl HistorySlots for InMemorySlots {
    fn write(&self, index: usize, bytes: &[u8]) -> Result<(), StorageError> {
        let mut slots = self.slots.lock();
        if let Some(quota) = self.quota {
            let used: usize = slots
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .filter_map(|(_, slot)| slot.as_ref())
                .map(|existing| existing.len())
                .sum();
            if used + bytes.len() > quota {
                return Err(StorageError::QuotaExceeded {
                    needed: bytes.len(),
                    available: quota.saturating_sub(used),
                });
            }
        }
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        slots[index] = Some(bytes.to_vec());
        Ok(())
    }

    fn read(&self, index: usize) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.slots.lock().get(index).cloned().flatten())
    }

    fn truncate(&self, len: usize) {
        self.slots.lock().truncate(len);
    }
}
