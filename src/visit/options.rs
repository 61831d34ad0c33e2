//! Per-visit options.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::page::Page;
use crate::transport::query::ArrayFormat;
use crate::visit::hooks::VisitHooks;

pub use crate::transport::Method;

/// A flag resolvable against the response page.
#[derive(Clone, Default)]
pub enum Preserve {
    #[default]
    No,
    Yes,
    /// Evaluated against the resolved page; a falsy result wins even though
    /// the option was requested.
    Resolve(Arc<dyn Fn(&Page) -> bool + Send + Sync>),
}

impl Preserve {
    pub fn resolve(&self, page: &Page) -> bool {
        match self {
            Preserve::No => false,
            Preserve::Yes => true,
            Preserve::Resolve(f) => f(page),
        }
    }
}

impl From<bool> for Preserve {
    fn from(value: bool) -> Self {
        if value {
            Preserve::Yes
        } else {
            Preserve::No
        }
    }
}

impl fmt::Debug for Preserve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preserve::No => f.write_str("No"),
            Preserve::Yes => f.write_str("Yes"),
            Preserve::Resolve(_) => f.write_str("Resolve(..)"),
        }
    }
}

/// Payload of a visit.
#[derive(Debug, Clone, Default)]
pub enum VisitData {
    #[default]
    None,
    /// Object payload: query string for GET, JSON body otherwise.
    Json(Value),
    /// Pre-encoded body, e.g. multipart form data for uploads.
    Raw { content_type: String, bytes: Vec<u8> },
}

/// Everything configurable about one visit.
#[derive(Clone, Default)]
pub struct VisitOptions {
    pub method: Method,
    pub data: VisitData,
    pub headers: Vec<(String, String)>,
    /// Partial-reload field selectors.
    pub only: Vec<String>,
    pub except: Vec<String>,
    /// Replace the current history entry instead of pushing.
    pub replace: bool,
    pub preserve_scroll: Preserve,
    pub preserve_state: Preserve,
    /// Scope validation errors to a named bag.
    pub error_bag: Option<String>,
    /// Override the configured query array format for this visit.
    pub array_format: Option<ArrayFormat>,
    pub hooks: VisitHooks,
}

impl VisitOptions {
    pub fn get() -> Self {
        Self::default()
    }

    pub fn post(data: Value) -> Self {
        Self {
            method: Method::Post,
            data: VisitData::Json(data),
            ..Default::default()
        }
    }

    pub fn put(data: Value) -> Self {
        Self {
            method: Method::Put,
            data: VisitData::Json(data),
            ..Default::default()
        }
    }

    pub fn patch(data: Value) -> Self {
        Self {
            method: Method::Patch,
            data: VisitData::Json(data),
            ..Default::default()
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::Delete,
            ..Default::default()
        }
    }

    /// Options for a reload-style visit: same URL, state and scroll kept.
    pub fn reload() -> Self {
        Self {
            preserve_scroll: Preserve::Yes,
            preserve_state: Preserve::Yes,
            ..Default::default()
        }
    }

    pub fn with_only(mut self, fields: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.only = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_hooks(mut self, hooks: VisitHooks) -> Self {
        self.hooks = hooks;
        self
    }
}

impl fmt::Debug for VisitOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisitOptions")
            .field("method", &self.method)
            .field("only", &self.only)
            .field("except", &self.except)
            .field("replace", &self.replace)
            .field("preserve_scroll", &self.preserve_scroll)
            .field("preserve_state", &self.preserve_state)
            .field("error_bag", &self.error_bag)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}
