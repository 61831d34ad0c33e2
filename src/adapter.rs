//! Collaborator seams to the view-binding layer.
//!
//! The engine decides *what data is current*; a framework adapter owns the
//! actual mounting. `resolve` turns a component name into a renderable
//! artifact kept on the adapter side, and `swap` mounts it exactly once per
//! settled navigation.

use thiserror::Error;

use crate::page::Page;
use crate::transport::BoxFuture;

/// Failure reported by the view layer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct AdapterError {
    pub message: String,
}

impl AdapterError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Arguments for one view swap.
#[derive(Debug, Clone)]
pub struct SwapRequest {
    pub component: String,
    pub page: Page,
    /// Resolved `preserveState` value for this navigation.
    pub preserve_state: bool,
}

/// The view-binding collaborator.
pub trait ViewAdapter: Send + Sync {
    /// Resolve `component` to a renderable artifact. May load it lazily;
    /// the artifact stays with the adapter until the matching `swap`.
    fn resolve<'a>(&'a self, component: &'a str) -> BoxFuture<'a, Result<(), AdapterError>>;

    /// Mount the previously resolved component with the new page.
    fn swap(&self, request: SwapRequest) -> BoxFuture<'_, Result<(), AdapterError>>;
}
