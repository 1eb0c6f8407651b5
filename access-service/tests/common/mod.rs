//! Test helpers for access-service integration tests.
//!
//! Builds the full router over the in-memory store with a manual clock and a
//! recording delivery channel, and drives it with `oneshot`.

#![allow(dead_code)]

use access_service::{
    build_router,
    config::AccessConfig,
    services::{
        store::{GrantStore, IdentityStore, MemoryStore, PendingStore},
        ManualClock, RecordingDelivery,
    },
    AppState,
};
use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const TEST_ADMIN_API_KEY: &str = "test-admin-key-12345";
pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub delivery: Arc<RecordingDelivery>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(&[]).await
    }

    /// Spawn with extra configuration variables.
    pub async fn spawn_with(vars: &[(&str, &str)]) -> Self {
        Self::spawn_on(Arc::new(MemoryStore::new()), vars).await
    }

    pub async fn spawn_on<S>(store: Arc<S>, vars: &[(&str, &str)]) -> Self
    where
        S: IdentityStore + PendingStore + GrantStore + 'static,
    {
        let mut env: HashMap<String, String> = HashMap::from([
            ("ADMIN_API_KEY".to_string(), TEST_ADMIN_API_KEY.to_string()),
            ("SERVICE_NAME".to_string(), "access-service-test".to_string()),
            ("LOG_LEVEL".to_string(), "error".to_string()),
        ]);
        for (key, value) in vars {
            env.insert(key.to_string(), value.to_string());
        }

        let config = AccessConfig::from_lookup(Default::default(), |key| env.get(key).cloned())
            .expect("Failed to build test config");

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let delivery = Arc::new(RecordingDelivery::new());
        let state = AppState::build(config, store, clock.clone(), delivery.clone());
        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            router,
            state,
            clock,
            delivery,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        headers: &[(&str, String)],
        body: Option<Value>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, value.as_str());
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("Failed to build request");

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn signup(&self, email: &str) -> Response<Body> {
        self.request(
            Method::POST,
            "/api/users",
            &[],
            Some(json!({
                "email": email,
                "password": PASSWORD,
                "first_name": "Ada",
                "last_name": "Lovelace",
                "position_title": "Analyst",
                "purchased_products": ["product-1"]
            })),
        )
        .await
    }

    pub async fn admin(&self, method: Method, uri: &str) -> Response<Body> {
        self.request(method, uri, &[admin_key()], None).await
    }

    pub async fn approve(&self, email: &str) -> Response<Body> {
        self.admin(Method::POST, &format!("/admin/users/{}/approve", email))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Response<Body> {
        self.request(
            Method::POST,
            "/api/tokens",
            &[],
            Some(json!({ "email": email, "password": password })),
        )
        .await
    }

    /// Sign up, approve and log in; returns the bearer token.
    pub async fn approved_user(&self, email: &str) -> String {
        assert_eq!(self.signup(email).await.status(), StatusCode::CREATED);
        assert_eq!(self.approve(email).await.status(), StatusCode::OK);

        let response = self.login(email, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .expect("Login response carries no token")
            .to_string()
    }
}

pub fn admin_key() -> (&'static str, String) {
    ("x-admin-api-key", TEST_ADMIN_API_KEY.to_string())
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("authorization", format!("Bearer {}", token))
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
