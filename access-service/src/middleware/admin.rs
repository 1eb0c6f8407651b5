use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::AppState;

pub const ADMIN_API_KEY_HEADER: &str = "x-admin-api-key";

/// Gate for administrative routes: `X-Admin-Api-Key` must match the
/// configured key.
pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Response {
    let api_key = headers
        .get(ADMIN_API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if keys_match(key, &state.config.security.admin_api_key) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Failed admin authentication attempt");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "Unauthorized: Invalid or missing admin API key" })),
            )
                .into_response()
        }
    }
}

fn keys_match(presented: &str, expected: &str) -> bool {
    presented.as_bytes().ct_eq(expected.as_bytes()).into()
}
