//! Visit lifecycle hooks.
//!
//! Hooks fire in a fixed order per visit:
//! `before → start → (progress)* → (success | error) → finish`, with
//! `finish` guaranteed exactly once however the visit ends. A `before`
//! returning `false` aborts the visit before anything else runs.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::error::{ValidationErrors, VisitError};
use crate::page::Page;
use crate::transport::Method;

pub use crate::transport::progress::{Progress, ProgressCallback};

/// Snapshot describing a visit before any network activity.
#[derive(Debug, Clone)]
pub struct PendingVisit {
    pub id: Uuid,
    pub url: String,
    pub method: Method,
}

/// How a visit ended, delivered through `finish` and the visit handle.
#[derive(Debug, Clone)]
pub enum VisitConclusion {
    Completed(CompletedVisit),
    /// Control-flow signal, not an error: the host should perform a full
    /// non-SPA navigation to `url`.
    LocationRedirect { url: String },
    Cancelled,
    Failed(VisitError),
}

/// Details of a settled navigation.
#[derive(Debug, Clone)]
pub struct CompletedVisit {
    pub component: String,
    pub url: String,
    /// Resolved option values, observable for diagnostics.
    pub preserve_scroll: bool,
    pub preserve_state: bool,
    /// The response's asset version differed from the known one; the host
    /// decides whether to force a hard reload.
    pub version_mismatch: bool,
    /// Once props whose cached value had expired and must be refetched.
    pub stale_once: Vec<String>,
    /// Bag-scoped validation errors, when the page carried any.
    pub validation_errors: Option<ValidationErrors>,
}

type BeforeHook = Arc<dyn Fn(&PendingVisit) -> bool + Send + Sync>;
type StartHook = Arc<dyn Fn(&PendingVisit) + Send + Sync>;
type SuccessHook = Arc<dyn Fn(&Page) + Send + Sync>;
type ErrorHook = Arc<dyn Fn(&VisitError) + Send + Sync>;
type CancelHook = Arc<dyn Fn() + Send + Sync>;
type FinishHook = Arc<dyn Fn(&VisitConclusion) + Send + Sync>;

/// Per-visit callbacks. All optional; clones share the same closures.
#[derive(Clone, Default)]
pub struct VisitHooks {
    pub on_before: Option<BeforeHook>,
    pub on_start: Option<StartHook>,
    pub on_progress: Option<ProgressCallback>,
    pub on_success: Option<SuccessHook>,
    pub on_error: Option<ErrorHook>,
    pub on_cancel: Option<CancelHook>,
    pub on_finish: Option<FinishHook>,
}

impl VisitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before(mut self, f: impl Fn(&PendingVisit) -> bool + Send + Sync + 'static) -> Self {
        self.on_before = Some(Arc::new(f));
        self
    }

    pub fn start(mut self, f: impl Fn(&PendingVisit) + Send + Sync + 'static) -> Self {
        self.on_start = Some(Arc::new(f));
        self
    }

    pub fn progress(mut self, f: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(f));
        self
    }

    pub fn success(mut self, f: impl Fn(&Page) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn error(mut self, f: impl Fn(&VisitError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub fn cancel(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_cancel = Some(Arc::new(f));
        self
    }

    pub fn finish(mut self, f: impl Fn(&VisitConclusion) + Send + Sync + 'static) -> Self {
        self.on_finish = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for VisitHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitHooks")
            .field("before", &self.on_before.is_some())
            .field("start", &self.on_start.is_some())
            .field("progress", &self.on_progress.is_some())
            .field("success", &self.on_success.is_some())
            .field("error", &self.on_error.is_some())
            .field("cancel", &self.on_cancel.is_some())
            .field("finish", &self.on_finish.is_some())
            .finish()
    }
}
