//! Classification of server responses.
//!
//! A response is one of three things: an Inertia page (marked by the
//! `X-Inertia` response header), a location redirect (409 plus a redirect
//! target), or foreign content the engine must surface as invalid rather
//! than crash on.

use crate::error::ValidationErrors;
use crate::page::Page;
use crate::transport::headers;

/// A fully buffered HTTP response, transport-agnostic.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// First header value matching `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }
}

/// What a response means for the visit.
#[derive(Debug, Clone)]
pub enum Classified {
    /// Normal SPA swap.
    Page(Box<Page>),
    /// Fall back to a full non-SPA navigation.
    Location { url: String },
    /// Not an Inertia response; surfaced for diagnostics, never applied.
    Invalid {
        status: u16,
        content_type: Option<String>,
    },
}

pub fn classify(response: &TransportResponse) -> Classified {
    if response.status == 409 {
        if let Some(url) = response.header(headers::LOCATION) {
            return Classified::Location {
                url: url.to_string(),
            };
        }
    }

    let marked = response
        .header(headers::INERTIA)
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"));

    if marked {
        if let Ok(page) = serde_json::from_slice::<Page>(&response.body) {
            return Classified::Page(Box::new(page));
        }
    }

    Classified::Invalid {
        status: response.status,
        content_type: response.content_type().map(str::to_string),
    }
}

/// Pull per-field validation errors off a page, scoped to an error bag.
pub fn extract_errors(page: &Page, bag: Option<&str>) -> ValidationErrors {
    let errors = page
        .props
        .get("errors")
        .and_then(|v| v.as_object())
        .cloned()
        .unwrap_or_default();
    match bag {
        Some(bag) => errors
            .get(bag)
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default(),
        None => errors,
    }
}
