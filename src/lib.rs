//! Client-side visit engine for Inertia-protocol server-driven apps.
//!
//! The engine turns a navigation intent — link click, form submit,
//! programmatic call, poll tick, scroll-triggered fetch — into exactly one
//! winning in-flight request, reconciles the JSON response into page state,
//! and keeps history, scroll positions and cached props consistent across
//! cancellations, partial reloads and concurrent background fetches.
//!
//! Every browser dependency is an injectable trait: HTTP ([`transport::Transport`]),
//! history slots ([`history::HistorySlots`]), scroll regions
//! ([`scroll::ScrollView`]), cookies ([`transport::headers::CookieSource`])
//! and view mounting ([`adapter::ViewAdapter`]), so the engine runs and
//! tests headless. The [`visit::Navigator`] is the facade that ties them
//! together.

pub mod adapter;
pub mod config;
pub mod error;
pub mod history;
pub mod page;
pub mod prefetch;
pub mod props;
pub mod scroll;
pub mod transport;
pub mod visit;

pub use config::Config;
pub use error::{ValidationErrors, VisitError};
pub use page::{Page, PageHandle, Props, ScrollOffset};
pub use visit::{
    CompletedVisit, EngineEvent, HistoryOutcome, Method, MutateOptions, Navigator, Platform,
    PollOptions, Preserve, VisitConclusion, VisitData, VisitHandle, VisitHooks, VisitOptions,
    VisitState,
};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for hosts that do not configure their own subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}
