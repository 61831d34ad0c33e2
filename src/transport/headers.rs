//! Protocol header assembly.
//!
//! Every SPA-style request carries the Inertia marker headers; partial
//! reloads add the component and field-selector headers. Protocol headers
//! are applied after caller-supplied ones and can never be overridden.

pub const INERTIA: &str = "X-Inertia";
pub const VERSION: &str = "X-Inertia-Version";
pub const PARTIAL_COMPONENT: &str = "X-Inertia-Partial-Component";
pub const PARTIAL_DATA: &str = "X-Inertia-Partial-Data";
pub const PARTIAL_EXCEPT: &str = "X-Inertia-Partial-Except";
pub const ERROR_BAG: &str = "X-Inertia-Error-Bag";
pub const LOCATION: &str = "X-Inertia-Location";
pub const XSRF_HEADER: &str = "X-XSRF-TOKEN";
pub const XSRF_COOKIE: &str = "XSRF-TOKEN";

const RESERVED: &[&str] = &[
    "x-inertia",
    "x-inertia-version",
    "x-inertia-partial-component",
    "x-inertia-partial-data",
    "x-inertia-partial-except",
    "x-inertia-error-bag",
    "x-xsrf-token",
    "x-requested-with",
    "accept",
];

/// Read-only view of the cookie jar, used to forward the XSRF token.
pub trait CookieSource: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
}

/// Cookie source for hosts without a cookie jar.
pub struct NoCookies;

impl CookieSource for NoCookies {
    fn get(&self, _name: &str) -> Option<String> {
        None
    }
}

/// Protocol-level inputs for one request's header set.
#[derive(Debug, Default)]
pub struct ProtocolHeaders<'a> {
    pub version: Option<&'a str>,
    /// Current component name; required alongside `only`/`except`.
    pub partial_component: Option<&'a str>,
    pub only: &'a [String],
    pub except: &'a [String],
    pub error_bag: Option<&'a str>,
}

/// Combine caller headers with the protocol set.
///
/// Caller headers colliding with a reserved name are dropped.
pub fn assemble(
    user: &[(String, String)],
    protocol: &ProtocolHeaders<'_>,
    cookies: &dyn CookieSource,
) -> Vec<(String, String)> {
    let mut headers: Vec<(String, String)> = user
        .iter()
        .filter(|(name, _)| !RESERVED.contains(&name.to_ascii_lowercase().as_str()))
        .cloned()
        .collect();

    headers.push(("Accept".to_string(), "text/html, application/xhtml+xml".to_string()));
    headers.push(("X-Requested-With".to_string(), "XMLHttpRequest".to_string()));
    headers.push((INERTIA.to_string(), "true".to_string()));

    if let Some(version) = protocol.version {
        headers.push((VERSION.to_string(), version.to_string()));
    }

    if let Some(component) = protocol.partial_component {
        if !protocol.only.is_empty() || !protocol.except.is_empty() {
            headers.push((PARTIAL_COMPONENT.to_string(), component.to_string()));
            if !protocol.only.is_empty() {
                headers.push((PARTIAL_DATA.to_string(), protocol.only.join(",")));
            }
            if !protocol.except.is_empty() {
                headers.push((PARTIAL_EXCEPT.to_string(), protocol.except.join(",")));
            }
        }
    }

    if let Some(bag) = protocol.error_bag {
        headers.push((ERROR_BAG.to_string(), bag.to_string()));
    }

    if let Some(token) = cookies.get(XSRF_COOKIE) {
        headers.push((XSRF_HEADER.to_string(), token));
    }

    headers
}
