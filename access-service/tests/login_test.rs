//! Login over both token transports.

mod common;

use axum::http::{header, Method, StatusCode};
use common::{bearer, body_json, TestApp, PASSWORD};

#[tokio::test]
async fn login_returns_bearer_token_in_header() {
    let app = TestApp::spawn().await;
    app.signup("ada@example.com").await;
    app.approve("ada@example.com").await;

    let response = app.login("ada@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());

    let token = response
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap()
        .to_string();
    assert_eq!(token.len(), 64);

    let body = body_json(response).await;
    assert_eq!(body["email"], "ada@example.com");
    assert_eq!(body["expires_in"], 168 * 3600);
    assert!(body.get("token").is_none());
    assert!(!body.to_string().contains(&token));
}

#[tokio::test]
async fn login_rejects_wrong_password_without_artifact() {
    let app = TestApp::spawn().await;
    app.approved_user("ada@example.com").await;

    let response = app.login("ada@example.com", "not-the-password").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().get(header::AUTHORIZATION).is_none());
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn unknown_and_unapproved_users_cannot_log_in() {
    let app = TestApp::spawn().await;

    let unknown = app.login("ghost@example.com", PASSWORD).await;
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    app.signup("ada@example.com").await;
    let pending = app.login("ada@example.com", PASSWORD).await;
    assert_eq!(pending.status(), StatusCode::UNAUTHORIZED);

    let unknown_body = body_json(unknown).await;
    let pending_body = body_json(pending).await;
    assert_eq!(unknown_body, pending_body);
}

#[tokio::test]
async fn new_login_replaces_previous_grant() {
    let app = TestApp::spawn().await;
    let first = app.approved_user("ada@example.com").await;

    let response = app.login("ada@example.com", PASSWORD).await;
    let second = response
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap()
        .to_string();
    assert_ne!(first, second);

    let uri = "/api/users/ada@example.com";
    let stale = app.request(Method::GET, uri, &[bearer(&first)], None).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let fresh = app.request(Method::GET, uri, &[bearer(&second)], None).await;
    assert_eq!(fresh.status(), StatusCode::OK);
}

#[tokio::test]
async fn cookie_transport_sets_hardened_cookie() {
    let app = TestApp::spawn_with(&[("TOKEN_TRANSPORT", "cookie"), ("TOKEN_COOKIE_NAME", "sid")]).await;
    app.signup("ada@example.com").await;
    app.approve("ada@example.com").await;

    let response = app.login("ada@example.com", PASSWORD).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::AUTHORIZATION).is_none());

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("sid="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(cookie.contains("Path=/"));

    let pair = cookie.split(';').next().unwrap().to_string();
    let token = pair.trim_start_matches("sid=").to_string();
    let uri = "/api/users/ada@example.com";

    let response = app
        .request(Method::GET, uri, &[("cookie", pair)], None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, uri, &[bearer(&token)], None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_is_rate_limited_per_ip() {
    let app = TestApp::spawn_with(&[("RATE_LIMIT_LOGIN_ATTEMPTS", "2")]).await;
    let ip = ("x-forwarded-for", "198.51.100.4".to_string());
    let body = serde_json::json!({ "email": "ada@example.com", "password": PASSWORD });

    for expected in [
        StatusCode::UNAUTHORIZED,
        StatusCode::UNAUTHORIZED,
        StatusCode::TOO_MANY_REQUESTS,
    ] {
        let response = app
            .request(Method::POST, "/api/tokens", &[ip.clone()], Some(body.clone()))
            .await;
        assert_eq!(response.status(), expected);
    }
}
