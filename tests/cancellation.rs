//! Cancellation exclusivity: for any sequence of rapid-fire visits, only
//! the last one's result reaches page and history state.

mod common;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use common::mock_server::{MockResponse, MockServer};
use common::{home_page, host_with};
use inertia_core::{VisitConclusion, VisitHooks, VisitOptions, VisitState};

#[tokio::test]
async fn rapid_fire_visits_only_the_last_wins() {
    let server = MockServer::start().await;
    server
        .enqueue(
            MockResponse::simple_page("A", "/a", json!({"from": "a"})).with_delay(150),
        )
        .await;
    server
        .enqueue(MockResponse::simple_page("B", "/b", json!({"from": "b"})))
        .await;
    let host = host_with(&server, home_page()).await;

    let cancelled = Arc::new(Mutex::new(0usize));
    let finished = Arc::new(Mutex::new(0usize));
    let succeeded = Arc::new(Mutex::new(0usize));
    let hooks = {
        let cancelled = cancelled.clone();
        let finished = finished.clone();
        let succeeded = succeeded.clone();
        VisitHooks::new()
            .cancel(move || *cancelled.lock() += 1)
            .finish(move |_| *finished.lock() += 1)
            .success(move |_| *succeeded.lock() += 1)
    };

    let first = host
        .navigator
        .visit("/a", VisitOptions::default().with_hooks(hooks));
    // Let /a reach the wire so the queued responses pair up with their
    // visits deterministically; its response is still 150ms out.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = host.navigator.visit("/b", VisitOptions::default());

    // Superseding is synchronous: by the time visit() returns, the old
    // visit is flagged interrupted and its hooks have fired.
    assert_eq!(first.state(), VisitState::Interrupted);
    assert_eq!(*cancelled.lock(), 1);
    assert_eq!(*finished.lock(), 1);

    assert!(matches!(first.conclusion().await, VisitConclusion::Cancelled));
    assert!(matches!(
        second.conclusion().await,
        VisitConclusion::Completed(_)
    ));

    // Give the slow /a response time to land; it must be discarded.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(*succeeded.lock(), 0);
    assert_eq!(host.navigator.page().component().as_deref(), Some("B"));
    assert_eq!(
        host.navigator.page().get().unwrap().props["from"],
        json!("b")
    );
    // Initial swap plus B only; A never swapped.
    assert_eq!(
        host.adapter.swapped_components(),
        vec!["Home".to_string(), "B".to_string()]
    );
    // History holds Home -> B, nothing from A.
    assert_eq!(host.navigator.history().len(), 2);
    assert_eq!(host.navigator.history().current().unwrap().url, "/b");
}

#[tokio::test]
async fn explicit_cancel_stops_the_pending_visit() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::simple_page("Slow", "/slow", json!({})).with_delay(200))
        .await;
    let host = host_with(&server, home_page()).await;

    let handle = host.navigator.visit("/slow", VisitOptions::default());
    tokio::time::sleep(Duration::from_millis(20)).await;
    host.navigator.cancel();

    assert!(matches!(
        handle.conclusion().await,
        VisitConclusion::Cancelled
    ));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(host.navigator.page().component().as_deref(), Some("Home"));
    assert_eq!(host.adapter.swap_count(), 1);
}

fn deferred_page(component: &str, url: &str) -> serde_json::Value {
    json!({
        "component": component,
        "props": {},
        "url": url,
        "deferredProps": {
            "users": ["users"],
            "stats": ["stats"],
            "activity": ["activity"],
        },
    })
}

fn group_page(component: &str, url: &str, field: &str, value: &str) -> MockResponse {
    MockResponse::page(json!({
        "component": component,
        "props": { field: value },
        "url": url,
    }))
}

#[tokio::test]
async fn navigating_away_cancels_deferred_groups_of_the_old_page() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    // Page A defers three groups whose responses are slow; page B defers
    // the same three with fast responses. Each keyed queue serves A's
    // sub-request first, then B's.
    server.enqueue(MockResponse::page(deferred_page("A", "/a"))).await;
    for field in ["users", "stats", "activity"] {
        server
            .enqueue_for_partial(field, group_page("A", "/a", field, "from-a").with_delay(200))
            .await;
    }

    let conclusion = host
        .navigator
        .visit("/a", VisitOptions::default())
        .conclusion()
        .await;
    assert!(matches!(conclusion, VisitConclusion::Completed(_)));

    // A's three deferred sub-requests are now in flight. Navigate to B
    // before any of them resolves.
    tokio::time::sleep(Duration::from_millis(30)).await;
    server.enqueue(MockResponse::page(deferred_page("B", "/b"))).await;
    for field in ["users", "stats", "activity"] {
        server
            .enqueue_for_partial(field, group_page("B", "/b", field, "from-b"))
            .await;
    }
    let conclusion = host
        .navigator
        .visit("/b", VisitOptions::default())
        .conclusion()
        .await;
    assert!(matches!(conclusion, VisitConclusion::Completed(_)));

    // Wait past A's slow group responses: late successes must be discarded.
    tokio::time::sleep(Duration::from_millis(350)).await;

    let page = host.navigator.page().get().unwrap();
    assert_eq!(page.component, "B");
    assert_eq!(page.props.get("users"), Some(&json!("from-b")));
    assert_eq!(page.props.get("stats"), Some(&json!("from-b")));
    assert_eq!(page.props.get("activity"), Some(&json!("from-b")));

    // Nothing from A leaked into current state or history.
    let stored = host.navigator.history().current().unwrap().page.unwrap();
    for field in ["users", "stats", "activity"] {
        assert_eq!(stored.props.get(field), Some(&json!("from-b")));
    }
}

#[tokio::test]
async fn reloading_the_same_destination_keeps_deferred_groups_alive() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    server
        .enqueue(MockResponse::page(json!({
            "component": "A",
            "props": {},
            "url": "/a",
            "deferredProps": {"users": ["users"]},
        })))
        .await;
    server
        .enqueue_for_partial("users", group_page("A", "/a", "users", "deferred").with_delay(100))
        .await;

    host.navigator
        .visit("/a", VisitOptions::default())
        .conclusion()
        .await;

    // A same-destination reload must not cancel the in-flight group.
    server
        .enqueue(MockResponse::simple_page("A", "/a", json!({"fresh": true})))
        .await;
    host.navigator
        .reload(VisitOptions::reload())
        .unwrap()
        .conclusion()
        .await;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let page = host.navigator.page().get().unwrap();
    assert_eq!(page.props.get("users"), Some(&json!("deferred")));
    assert_eq!(page.props.get("fresh"), Some(&json!(true)));
}
