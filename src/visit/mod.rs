//! Visit orchestration: options, lifecycle hooks, cancellation, polling.

pub mod hooks;
pub mod options;
pub mod orchestrator;
pub mod poll;
pub mod token;

pub use hooks::{CompletedVisit, PendingVisit, Progress, VisitConclusion, VisitHooks};
pub use options::{Method, Preserve, VisitData, VisitOptions};
pub use orchestrator::{
    EngineEvent, HistoryOutcome, MutateOptions, Navigator, Platform, VisitHandle, VisitState,
};
pub use poll::{PollOptions, Poller};
pub use token::CancellationToken;
