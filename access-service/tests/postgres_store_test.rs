//! Lifecycle against a real PostgreSQL backend.

mod common;

use access_service::services::store::PgStore;
use axum::http::{Method, StatusCode};
use chrono::Utc;
use common::{bearer, TestApp, PASSWORD};
use std::sync::Arc;

async fn pg_store() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let store = PgStore::connect(&url, 5).await.expect("Failed to connect");
    store.migrate().await.expect("Failed to migrate");
    store
}

fn unique_email() -> String {
    format!(
        "pg-{}@example.com",
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn signup_approve_login_round_trip() {
    let store = Arc::new(pg_store().await);
    let app = TestApp::spawn_on(store.clone(), &[]).await;
    let email = unique_email();

    assert_eq!(app.signup(&email).await.status(), StatusCode::CREATED);
    assert_eq!(app.signup(&email).await.status(), StatusCode::CONFLICT);
    assert_eq!(app.approve(&email).await.status(), StatusCode::OK);
    assert_eq!(app.approve(&email).await.status(), StatusCode::CONFLICT);

    let token = {
        let response = app.login(&email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .unwrap()
            .to_string()
    };

    let uri = format!("/api/users/{}", email);
    let response = app.request(Method::GET, &uri, &[bearer(&token)], None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::DELETE, &uri, &[bearer(&token)], None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.request(Method::GET, &uri, &[bearer(&token)], None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM grants WHERE owner = $1")
        .bind(&email)
        .fetch_one(store.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
#[ignore] // Requires PostgreSQL
async fn rejected_identity_can_sign_up_again() {
    let app = TestApp::spawn_on(Arc::new(pg_store().await), &[]).await;
    let email = unique_email();

    app.signup(&email).await;
    let response = app
        .admin(Method::POST, &format!("/admin/users/{}/reject", email))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(app.signup(&email).await.status(), StatusCode::CREATED);
    app.admin(Method::DELETE, &format!("/admin/users/{}", email))
        .await;
}
