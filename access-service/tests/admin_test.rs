//! Admin API key enforcement.

mod common;

use axum::http::{Method, StatusCode};
use common::{body_json, TestApp};

#[tokio::test]
async fn admin_routes_reject_missing_key() {
    let app = TestApp::spawn().await;
    app.signup("ada@example.com").await;

    for (method, uri) in [
        (Method::GET, "/admin/pending"),
        (Method::POST, "/admin/users/ada@example.com/approve"),
        (Method::POST, "/admin/users/ada@example.com/reject"),
        (Method::DELETE, "/admin/users/ada@example.com"),
    ] {
        let response = app.request(method, uri, &[], None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert!(app.delivery.delivered().is_empty());
}

#[tokio::test]
async fn admin_routes_reject_wrong_key() {
    let app = TestApp::spawn().await;
    app.signup("ada@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/admin/users/ada@example.com/approve",
            &[("x-admin-api-key", "wrong-admin-key-00000".to_string())],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = body_json(app.admin(Method::GET, "/admin/pending").await).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn user_grant_is_not_an_admin_credential() {
    let app = TestApp::spawn().await;
    let token = app.approved_user("ada@example.com").await;

    let response = app
        .request(Method::GET, "/admin/pending", &[common::bearer(&token)], None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn pending_list_is_ordered_by_request_time() {
    let app = TestApp::spawn().await;

    app.signup("zed@example.com").await;
    app.clock.advance(chrono::Duration::seconds(5));
    app.signup("amy@example.com").await;

    let body = body_json(app.admin(Method::GET, "/admin/pending").await).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["pending"][0]["email"], "zed@example.com");
    assert_eq!(body["pending"][1]["email"], "amy@example.com");
}
