//! Mock Inertia server for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, Response, StatusCode};
use axum::routing::any;
use axum::Router;
use http_body_util::BodyExt;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// A captured request for assertions.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn partial_data(&self) -> Option<&str> {
        self.header("x-inertia-partial-data")
    }
}

/// A mock response to return.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay_ms: u64,
}

impl MockResponse {
    /// Inertia-marked JSON page from a raw page object.
    pub fn page(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            headers: vec![
                ("content-type".to_string(), "application/json".to_string()),
                ("x-inertia".to_string(), "true".to_string()),
            ],
            body: value.to_string().into_bytes(),
            delay_ms: 0,
        }
    }

    /// Minimal page with just component, url and props.
    pub fn simple_page(component: &str, url: &str, props: serde_json::Value) -> Self {
        Self::page(json!({
            "component": component,
            "props": props,
            "url": url,
        }))
    }

    /// 409 conflict carrying a redirect target.
    pub fn location(url: &str) -> Self {
        Self {
            status: 409,
            headers: vec![("x-inertia-location".to_string(), url.to_string())],
            body: Vec::new(),
            delay_ms: 0,
        }
    }

    /// Foreign content the engine must treat as invalid.
    pub fn html(body: &str) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: body.as_bytes().to_vec(),
            delay_ms: 0,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }
}

#[derive(Clone)]
struct MockState {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    fifo: Arc<Mutex<VecDeque<MockResponse>>>,
    /// Responses keyed by the exact `X-Inertia-Partial-Data` value, for
    /// deterministic matching when sub-requests arrive concurrently.
    keyed: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
}

/// Mock Inertia backend for integration tests.
pub struct MockServer {
    pub addr: SocketAddr,
    state: MockState,
    shutdown: tokio::sync::watch::Sender<bool>,
}

impl MockServer {
    pub async fn start() -> Self {
        let state = MockState {
            requests: Arc::new(Mutex::new(Vec::new())),
            fifo: Arc::new(Mutex::new(VecDeque::new())),
            keyed: Arc::new(Mutex::new(HashMap::new())),
        };

        let (shutdown_tx, mut shutdown_rx) = tokio::sync::watch::channel(false);

        let app = Router::new()
            .route("/", any(handle_request))
            .route("/{*path}", any(handle_request))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock server");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                })
                .await
                .ok();
        });

        // Wait for server to be ready
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;

        Self {
            addr,
            state,
            shutdown: shutdown_tx,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Enqueue a response for the next unmatched request.
    pub async fn enqueue(&self, response: MockResponse) {
        self.state.fifo.lock().await.push_back(response);
    }

    /// Enqueue a response served only to requests whose partial-data header
    /// equals `fields` exactly.
    pub async fn enqueue_for_partial(&self, fields: &str, response: MockResponse) {
        self.state
            .keyed
            .lock()
            .await
            .entry(fields.to_string())
            .or_default()
            .push_back(response);
    }

    pub async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.state.requests.lock().await.clone()
    }

    pub async fn request_count(&self) -> usize {
        self.state.requests.lock().await.len()
    }

    pub async fn clear(&self) {
        self.state.requests.lock().await.clear();
        self.state.fifo.lock().await.clear();
        self.state.keyed.lock().await.clear();
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

async fn handle_request(State(state): State<MockState>, req: Request<Body>) -> Response<Body> {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let query = req.uri().query().map(str::to_string);
    let headers: Vec<(String, String)> = req
        .headers()
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
        .collect();

    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes().to_vec())
        .unwrap_or_default();

    let captured = CapturedRequest {
        method,
        path: path.clone(),
        query,
        headers,
        body,
    };
    let partial = captured.partial_data().map(str::to_string);
    state.requests.lock().await.push(captured);

    // Keyed responses win over the FIFO queue; the fallback is a valid
    // Inertia page echoing the requested path.
    let mut response = None;
    if let Some(fields) = partial {
        if let Some(queue) = state.keyed.lock().await.get_mut(&fields) {
            response = queue.pop_front();
        }
    }
    if response.is_none() {
        response = state.fifo.lock().await.pop_front();
    }
    let response = response.unwrap_or_else(|| {
        MockResponse::simple_page("Fallback", &path, json!({}))
    });

    if response.delay_ms > 0 {
        tokio::time::sleep(tokio::time::Duration::from_millis(response.delay_ms)).await;
    }

    let mut builder = Response::builder().status(StatusCode::from_u16(response.status).unwrap());
    for (name, value) in response.headers {
        builder = builder.header(name, value);
    }
    builder.body(Body::from(response.body)).unwrap()
}
