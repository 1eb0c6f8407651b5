use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::access::{GrantResponse, LoginRequest},
    handlers::grant_outcome,
    hooks::{ContentFields, HookContext, TOKEN},
    utils::{Password, ValidatedJson},
    AppState,
};

/// Log in and receive an access grant
///
/// The token is delivered through the configured transport: an
/// `Authorization` response header or an HttpOnly cookie.
#[utoipa::path(
    post,
    path = "/api/tokens",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Access granted", body = GrantResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many login attempts", body = ErrorResponse),
        (status = 503, description = "Store unavailable", body = ErrorResponse)
    ),
    tag = "Tokens"
)]
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(TOKEN)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, req.email).with_fields(
        ContentFields::Credentials {
            password: Password::new(req.password),
        },
    );
    hooks.before_create(&mut ctx).await?;
    let grant = grant_outcome(ctx.outcome.take())?;

    let body = GrantResponse {
        email: grant.owner.clone(),
        issued_at: grant.issued_at,
        expires_at: grant.expires_at,
        expires_in: grant.remaining_seconds(state.clock.now()),
    };

    Ok((StatusCode::OK, response_headers, Json(body)))
}
