//! History behavior through the engine: quota degradation, back/forward
//! restore vs refetch, server-driven clearing, remembered state.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::mock_server::{MockResponse, MockServer};
use common::{home_page, host_with, host_with_parts, test_config, wait_for_event};
use inertia_core::history::InMemorySlots;
use inertia_core::{EngineEvent, HistoryOutcome, VisitOptions};

#[tokio::test]
async fn quota_overflow_degrades_entry_and_forces_refetch_on_back_forward() {
    let server = MockServer::start().await;
    // Quota fits the initial entry and one small page, not the big one.
    let slots = Arc::new(InMemorySlots::with_quota(2_000));
    let host = host_with_parts(test_config(&server.base_url()), home_page(), slots, 1).await;
    let mut events = host.navigator.events();

    server
        .enqueue(MockResponse::simple_page("Small", "/small", json!({"n": 1})))
        .await;
    host.navigator
        .visit("/small", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::simple_page(
            "Big",
            "/big",
            json!({"blob": "x".repeat(5_000)}),
        ))
        .await;
    host.navigator
        .visit("/big", VisitOptions::default())
        .conclusion()
        .await;

    wait_for_event(&mut events, |e| {
        matches!(e, EngineEvent::HistoryDegraded { .. })
    })
    .await;

    // Back to the intact entry: restored from storage, no network.
    let before = server.request_count().await;
    let outcome = host.navigator.navigate_history(-1).await;
    let HistoryOutcome::Restored { url, .. } = outcome else {
        panic!("small entry should restore without a refetch");
    };
    assert_eq!(url, "/small");
    assert_eq!(server.request_count().await, before);
    assert_eq!(host.navigator.page().component().as_deref(), Some("Small"));

    // Forward onto the thin entry: must refetch from the network.
    server
        .enqueue(MockResponse::simple_page(
            "Big",
            "/big",
            json!({"blob": "fresh"}),
        ))
        .await;
    let outcome = host.navigator.navigate_history(1).await;
    let HistoryOutcome::Refetching(handle) = outcome else {
        panic!("thin entry must trigger a network refetch");
    };
    handle.conclusion().await;
    assert_eq!(server.request_count().await, before + 1);
    assert_eq!(host.navigator.page().component().as_deref(), Some("Big"));
    assert_eq!(
        host.navigator.page().get().unwrap().props["blob"],
        json!("fresh")
    );
}

#[tokio::test]
async fn back_forward_past_the_stack_edges_is_reported() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;
    assert!(matches!(
        host.navigator.navigate_history(-1).await,
        HistoryOutcome::AtEdge
    ));
    assert!(matches!(
        host.navigator.navigate_history(1).await,
        HistoryOutcome::AtEdge
    ));
}

#[tokio::test]
async fn server_clear_history_flag_strips_earlier_payloads() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    server
        .enqueue(MockResponse::simple_page("A", "/a", json!({"n": 1})))
        .await;
    host.navigator
        .visit("/a", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::page(json!({
            "component": "LoggedOut",
            "props": {},
            "url": "/logout",
            "clearHistory": true,
        })))
        .await;
    host.navigator
        .visit("/logout", VisitOptions::default())
        .conclusion()
        .await;

    // The earlier entry lost its payload: going back must refetch.
    server
        .enqueue(MockResponse::simple_page("A", "/a", json!({"n": 2})))
        .await;
    match host.navigator.navigate_history(-1).await {
        HistoryOutcome::Refetching(handle) => {
            handle.conclusion().await;
        }
        other => panic!("expected refetch after history clear, got {other:?}"),
    }
    assert_eq!(host.navigator.page().get().unwrap().props["n"], json!(2));
}

#[tokio::test]
async fn remembered_state_survives_the_round_trip() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    host.navigator.remember("draft", json!("unsent text"));

    server
        .enqueue(MockResponse::simple_page("Other", "/other", json!({})))
        .await;
    host.navigator
        .visit("/other", VisitOptions::default())
        .conclusion()
        .await;
    assert_eq!(host.navigator.restored("draft"), None);

    let outcome = host.navigator.navigate_history(-1).await;
    assert!(matches!(outcome, HistoryOutcome::Restored { .. }));
    assert_eq!(host.navigator.restored("draft"), Some(json!("unsent text")));
}

#[tokio::test]
async fn replace_option_overwrites_instead_of_pushing() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    server
        .enqueue(MockResponse::simple_page("A", "/a", json!({})))
        .await;
    host.navigator
        .visit("/a", VisitOptions::default())
        .conclusion()
        .await;
    assert_eq!(host.navigator.history().len(), 2);

    server
        .enqueue(MockResponse::simple_page("B", "/b", json!({})))
        .await;
    host.navigator
        .visit(
            "/b",
            VisitOptions {
                replace: true,
                ..Default::default()
            },
        )
        .conclusion()
        .await;
    assert_eq!(host.navigator.history().len(), 2);
    assert_eq!(host.navigator.history().current().unwrap().url, "/b");
}

#[tokio::test]
async fn back_forward_interrupts_a_pending_visit() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    server
        .enqueue(MockResponse::simple_page("A", "/a", json!({})))
        .await;
    host.navigator
        .visit("/a", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::simple_page("Slow", "/slow", json!({})).with_delay(300))
        .await;
    let pending = host.navigator.visit("/slow", VisitOptions::default());
    tokio::time::sleep(std::time::Duration::from_millis(30)).await;

    let outcome = host.navigator.navigate_history(-1).await;
    assert!(matches!(outcome, HistoryOutcome::Restored { .. }));
    assert!(matches!(
        pending.conclusion().await,
        inertia_core::VisitConclusion::Cancelled
    ));
    assert_eq!(host.navigator.page().component().as_deref(), Some("Home"));
    // The slow response lands later but must not be applied.
    tokio::time::sleep(std::time::Duration::from_millis(350)).await;
    assert_eq!(host.navigator.page().component().as_deref(), Some("Home"));
}
