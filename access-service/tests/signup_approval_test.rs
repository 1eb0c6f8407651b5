//! Signup, approval and rejection flows through the HTTP surface.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{bearer, body_json, TestApp};
use serde_json::json;

#[tokio::test]
async fn signup_creates_pending_registration() {
    let app = TestApp::spawn().await;

    let response = app.signup("ada@example.com").await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = body_json(response).await;
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["account_status"], "pending");
    assert!(body.get("password").is_none());
    assert!(body.get("password_hash").is_none());

    let response = app.admin(Method::GET, "/admin/pending").await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["pending"][0]["email"], "ada@example.com");
}

#[tokio::test]
async fn duplicate_signup_is_conflict() {
    let app = TestApp::spawn().await;

    assert_eq!(app.signup("ada@example.com").await.status(), StatusCode::CREATED);
    assert_eq!(app.signup("ada@example.com").await.status(), StatusCode::CONFLICT);
    assert_eq!(app.signup("ADA@example.com").await.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn invalid_signup_is_rejected() {
    let app = TestApp::spawn().await;

    let response = app
        .request(
            Method::POST,
            "/api/users",
            &[],
            Some(json!({
                "email": "not-an-email",
                "password": "short",
                "first_name": "Ada",
                "last_name": "Lovelace"
            })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn approval_delivers_grant_to_user_only() {
    let app = TestApp::spawn().await;
    app.signup("ada@example.com").await;

    let response = app.approve("ada@example.com").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::AUTHORIZATION).is_none());
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let body = body_json(response).await;
    assert_eq!(body["user"]["account_status"], "approved");
    assert!(body.get("token").is_none());

    let grant = app
        .delivery
        .last_for("ada@example.com")
        .expect("grant was not delivered");

    let response = app
        .request(
            Method::GET,
            "/api/users/ada@example.com",
            &[bearer(&grant.token)],
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(app.admin(Method::GET, "/admin/pending").await).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn approval_requires_pending_identity() {
    let app = TestApp::spawn().await;

    assert_eq!(
        app.approve("ghost@example.com").await.status(),
        StatusCode::NOT_FOUND
    );

    app.signup("ada@example.com").await;
    assert_eq!(app.approve("ada@example.com").await.status(), StatusCode::OK);
    assert_eq!(
        app.approve("ada@example.com").await.status(),
        StatusCode::CONFLICT
    );
    assert_eq!(app.delivery.delivered().len(), 1);
}

#[tokio::test]
async fn rejection_allows_fresh_signup() {
    let app = TestApp::spawn().await;
    app.signup("ada@example.com").await;

    let response = app
        .admin(Method::POST, "/admin/users/ada@example.com/reject")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["account_status"], "rejected");

    assert_eq!(
        app.login("ada@example.com", common::PASSWORD).await.status(),
        StatusCode::UNAUTHORIZED
    );

    assert_eq!(app.signup("ada@example.com").await.status(), StatusCode::CREATED);
    let body = body_json(app.admin(Method::GET, "/admin/pending").await).await;
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn rejecting_approved_identity_keeps_status() {
    let app = TestApp::spawn().await;
    app.approved_user("ada@example.com").await;

    let response = app
        .admin(Method::POST, "/admin/users/ada@example.com/reject")
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["account_status"], "approved");

    assert_eq!(
        app.admin(Method::POST, "/admin/users/ghost@example.com/reject")
            .await
            .status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn signup_is_rate_limited_per_ip() {
    let app = TestApp::spawn_with(&[("RATE_LIMIT_SIGNUP_ATTEMPTS", "2")]).await;
    let ip = ("x-forwarded-for", "203.0.113.7".to_string());

    for (i, expected) in [StatusCode::CREATED, StatusCode::CREATED, StatusCode::TOO_MANY_REQUESTS]
        .into_iter()
        .enumerate()
    {
        let response = app
            .request(
                Method::POST,
                "/api/users",
                &[ip.clone()],
                Some(json!({
                    "email": format!("user{}@example.com", i),
                    "password": common::PASSWORD,
                    "first_name": "Ada",
                    "last_name": "Lovelace"
                })),
            )
            .await;
        assert_eq!(response.status(), expected);
    }
}
