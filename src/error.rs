//! Error taxonomy for the visit engine.
//!
//! Every failure a caller can observe is normalized into one of these kinds
//! before it reaches a lifecycle hook. Nothing escapes engine internals as a
//! raw transport error or an unhandled task panic.

use thiserror::Error;

/// Per-field validation errors, keyed by field name.
pub type ValidationErrors = serde_json::Map<String, serde_json::Value>;

/// Errors delivered through visit lifecycle hooks and conclusions.
#[derive(Debug, Clone, Error)]
pub enum VisitError {
    /// The visit was superseded by a newer one or cancelled explicitly.
    /// Delivered to `cancel`/`finish` hooks only, never as an application error.
    #[error("visit cancelled")]
    Cancelled,

    /// Structured per-field errors extracted from the response page,
    /// scoped to the visit's error bag when one was set.
    #[error("validation failed ({} field(s))", errors.len())]
    Validation {
        bag: Option<String>,
        errors: ValidationErrors,
    },

    /// The server answered with something that is not an Inertia page.
    /// Surfaced distinctly so a host can render a diagnostic overlay.
    #[error("invalid response: status {status}")]
    InvalidResponse {
        status: u16,
        content_type: Option<String>,
    },

    /// The view layer could not resolve the named component.
    #[error("component '{component}' failed to resolve: {message}")]
    Component { component: String, message: String },

    /// Network-level failure, already normalized to a message.
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl VisitError {
    /// Short kind tag for logging and event payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            VisitError::Cancelled => "cancelled",
            VisitError::Validation { .. } => "validation",
            VisitError::InvalidResponse { .. } => "invalid_response",
            VisitError::Component { .. } => "component",
            VisitError::Transport { .. } => "transport",
        }
    }
}
