//! Partial reloads: retention of unreturned fields and server-declared
//! merge strategies.

mod common;

use serde_json::json;

use common::mock_server::{MockResponse, MockServer};
use common::{home_page, host_with};
use inertia_core::VisitOptions;

#[tokio::test]
async fn partial_response_retains_unreturned_fields() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::simple_page(
            "Dash",
            "/dash",
            json!({"a": 1, "b": 2, "c": 3}),
        ))
        .await;
    let host = host_with(&server, home_page()).await;

    host.navigator
        .visit("/dash", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::simple_page("Dash", "/dash", json!({"a": 10})))
        .await;
    host.navigator
        .reload(VisitOptions::reload().with_only(["a"]))
        .unwrap()
        .conclusion()
        .await;

    let props = host.navigator.page().get().unwrap().props;
    assert_eq!(props.get("a"), Some(&json!(10)));
    assert_eq!(props.get("b"), Some(&json!(2)));
    assert_eq!(props.get("c"), Some(&json!(3)));
}

#[tokio::test]
async fn navigating_to_a_different_component_discards_retained_state() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::simple_page(
            "Dash",
            "/dash",
            json!({"a": 1, "b": 2}),
        ))
        .await;
    let host = host_with(&server, home_page()).await;
    host.navigator
        .visit("/dash", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::simple_page("Other", "/other", json!({"x": 9})))
        .await;
    host.navigator
        .visit("/other", VisitOptions::default())
        .conclusion()
        .await;

    let props = host.navigator.page().get().unwrap().props;
    assert_eq!(props.len(), 1);
    assert_eq!(props.get("x"), Some(&json!(9)));
}

#[tokio::test]
async fn merge_props_manifest_appends_instead_of_replacing() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::simple_page(
            "Feed",
            "/feed",
            json!({"items": [1, 2], "page": 1}),
        ))
        .await;
    let host = host_with(&server, home_page()).await;
    host.navigator
        .visit("/feed", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::page(json!({
            "component": "Feed",
            "props": {"items": [3, 4], "page": 2},
            "url": "/feed?page=2",
            "mergeProps": ["items"],
        })))
        .await;
    host.navigator
        .visit("/feed?page=2", VisitOptions::default())
        .conclusion()
        .await;

    let props = host.navigator.page().get().unwrap().props;
    assert_eq!(props.get("items"), Some(&json!([1, 2, 3, 4])));
    assert_eq!(props.get("page"), Some(&json!(2)));
}

#[tokio::test]
async fn match_on_manifest_deduplicates_by_identity() {
    let server = MockServer::start().await;
    server
        .enqueue(MockResponse::simple_page(
            "Users",
            "/users",
            json!({"users": [{"id": 1, "name": "a"}, {"id": 2, "name": "b"}]}),
        ))
        .await;
    let host = host_with(&server, home_page()).await;
    host.navigator
        .visit("/users", VisitOptions::default())
        .conclusion()
        .await;

    server
        .enqueue(MockResponse::page(json!({
            "component": "Users",
            "props": {"users": [{"id": 2, "name": "b2"}, {"id": 3, "name": "c"}]},
            "url": "/users",
            "mergeProps": ["users"],
            "matchPropsOn": ["users.id"],
        })))
        .await;
    host.navigator
        .reload(VisitOptions::reload())
        .unwrap()
        .conclusion()
        .await;

    let props = host.navigator.page().get().unwrap().props;
    assert_eq!(
        props.get("users"),
        Some(&json!([
            {"id": 1, "name": "a"},
            {"id": 2, "name": "b2"},
            {"id": 3, "name": "c"}
        ]))
    );
}

#[tokio::test]
async fn except_fields_travel_in_their_own_header() {
    let server = MockServer::start().await;
    let host = host_with(&server, home_page()).await;

    let options = VisitOptions {
        except: vec!["heavy".to_string()],
        ..VisitOptions::reload()
    };
    host.navigator.reload(options).unwrap().conclusion().await;

    let requests = server.captured_requests().await;
    assert_eq!(
        requests[0].header("x-inertia-partial-component"),
        Some("Home")
    );
    assert_eq!(requests[0].header("x-inertia-partial-except"), Some("heavy"));
    assert_eq!(requests[0].header("x-inertia-partial-data"), None);
}
