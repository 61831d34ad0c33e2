//! Prop reconciliation: merge strategies, once-prop persistence, and the
//! response-to-page reconcile pass.

pub mod merge;
pub mod once;
pub mod path;
pub mod reconcile;

pub use merge::{merge_props, MergeManifest};
pub use once::OncePropStore;
pub use reconcile::{reconcile, ReconcileOptions, ReconcileOutcome};
