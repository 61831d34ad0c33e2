//! Wire transport: the HTTP seam between the engine and the server.
//!
//! The engine talks to an abstract [`Transport`] so tests and alternative
//! hosts can substitute the network. The default implementation drives
//! `reqwest` with the connect/request timeouts from configuration.

pub mod headers;
pub mod progress;
pub mod query;
pub mod response;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Client;
use thiserror::Error;
use tokio::time::timeout;

use crate::config::TransportConfig;
use crate::error::VisitError;
use crate::transport::progress::{ProgressBody, ProgressCallback};
use crate::transport::response::TransportResponse;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// HTTP method of a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    pub fn is_get(&self) -> bool {
        matches!(self, Method::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Method {
    fn default() -> Self {
        Method::Get
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// Body of an outgoing request.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// Pre-encoded payload, e.g. multipart form data for file uploads.
    Raw {
        content_type: String,
        bytes: Vec<u8>,
    },
}

/// A fully resolved outgoing request: absolute URL, final header set.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Errors at the HTTP layer, normalized before they reach visit hooks.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {source}")]
    Connection {
        #[source]
        source: reqwest::Error,
    },

    #[error("request timeout after {duration}s")]
    Timeout { duration: u64 },

    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
}

impl From<TransportError> for VisitError {
    fn from(err: TransportError) -> Self {
        VisitError::Transport {
            message: err.to_string(),
        }
    }
}

/// Asynchronous, cancelable request execution.
///
/// Cancellation is driven by the caller dropping the returned future; the
/// orchestrator races it against the visit's cancellation token.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        spec: RequestSpec,
        progress: Option<ProgressCallback>,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>>;
}

/// Default transport over a shared `reqwest` client.
pub struct ReqwestTransport {
    client: Client,
    request_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(config: &TransportConfig) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .expect("Failed to build transport client");
        Self {
            client,
            request_timeout: Duration::from_secs(config.request_timeout_seconds),
        }
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        spec: RequestSpec,
        progress: Option<ProgressCallback>,
    ) -> BoxFuture<'_, Result<TransportResponse, TransportError>> {
        Box::pin(async move {
            let mut builder = self.client.request(spec.method.into(), &spec.url);
            for (name, value) in &spec.headers {
                builder = builder.header(name, value);
            }

            builder = match spec.body {
                Some(RequestBody::Json(value)) => match &progress {
                    // Stream the serialized payload so uploads report progress.
                    Some(callback) => {
                        let bytes = serde_json::to_vec(&value).map_err(|e| {
                            TransportError::InvalidRequest {
                                message: format!("failed to encode body: {e}"),
                            }
                        })?;
                        builder
                            .header("Content-Type", "application/json")
                            .body(reqwest::Body::wrap_stream(ProgressBody::new(
                                bytes,
                                callback.clone(),
                            )))
                    }
                    None => builder.json(&value),
                },
                Some(RequestBody::Raw {
                    content_type,
                    bytes,
                }) => {
                    let builder = builder.header("Content-Type", content_type);
                    match &progress {
                        Some(callback) => builder.body(reqwest::Body::wrap_stream(
                            ProgressBody::new(bytes, callback.clone()),
                        )),
                        None => builder.body(bytes),
                    }
                }
                None => builder,
            };

            let result = timeout(self.request_timeout, builder.send()).await;
            let response = match result {
                Ok(Ok(response)) => response,
                Ok(Err(source)) => return Err(TransportError::Connection { source }),
                Err(_) => {
                    return Err(TransportError::Timeout {
                        duration: self.request_timeout.as_secs(),
                    })
                }
            };

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        value.to_str().unwrap_or_default().to_string(),
                    )
                })
                .collect();
            let body = response
                .bytes()
                .await
                .map_err(|source| TransportError::Connection { source })?
                .to_vec();

            Ok(TransportResponse {
                status,
                headers,
                body,
            })
        })
    }
}
