mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, test_state};

#[tokio::test]
async fn health_reports_ok_and_services() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(test_state(dir.path()));

    let response = get(app, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    let services = json["services"].as_array().unwrap();
    assert!(services.contains(&serde_json::json!("mask")));
    // No face detector configured.
    assert!(!services.contains(&serde_json::json!("rename")));
}

#[tokio::test]
async fn index_lists_endpoints() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(test_state(dir.path()));

    let json = body_json(get(app, "/").await).await;
    assert_eq!(json["name"], "lookbook-api");
    assert_eq!(json["endpoints"]["mask"], "POST /api/v1/mask");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(test_state(dir.path()));

    let response = get(app, "/health").await;
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn unknown_route_is_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = build_test_app(test_state(dir.path()));

    let response = get(app, "/api/v1/nope").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
