use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::access::{DecisionResponse, MessageResponse, PendingResponse},
    handlers::identity_outcome,
    hooks::{HookContext, USER},
    AppState,
};

/// List registrations awaiting approval, oldest first
#[utoipa::path(
    get,
    path = "/admin/pending",
    responses(
        (status = 200, description = "Pending registrations", body = PendingResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_api_key" = []))
)]
pub async fn list_pending(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let pending = state.lifecycle.pending().await?;
    Ok(Json(PendingResponse {
        total: pending.len(),
        pending,
    }))
}

/// Approve a pending registration
///
/// Mints the user's first grant and hands it to the delivery channel. The
/// token never appears in this response.
#[utoipa::path(
    post,
    path = "/admin/users/{email}/approve",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Identity approved", body = DecisionResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse),
        (status = 409, description = "Identity is not pending", body = ErrorResponse),
        (status = 500, description = "Approved but grant delivery failed", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_api_key" = []))
)]
pub async fn approve_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, email);
    hooks.after_approve(&mut ctx).await?;
    let identity = identity_outcome(ctx.outcome.take())?;

    Ok(Json(DecisionResponse {
        user: identity.sanitized(),
        message: "Identity approved".to_string(),
    }))
}

/// Reject a pending registration
#[utoipa::path(
    post,
    path = "/admin/users/{email}/reject",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Registration rejected or already decided", body = DecisionResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_api_key" = []))
)]
pub async fn reject_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, email);
    hooks.after_reject(&mut ctx).await?;
    let identity = identity_outcome(ctx.outcome.take())?;

    Ok(Json(DecisionResponse {
        message: format!("Identity is {}", identity.account_status),
        user: identity.sanitized(),
    }))
}

/// Delete an identity
#[utoipa::path(
    delete,
    path = "/admin/users/{email}",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Identity deleted", body = MessageResponse),
        (status = 401, description = "Invalid or missing admin API key", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Admin",
    security(("admin_api_key" = []))
)]
pub async fn admin_delete_user(
    State(state): State<AppState>,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, email);
    hooks.after_admin_delete(&mut ctx).await?;

    Ok(Json(MessageResponse {
        message: "Identity deleted".to_string(),
    }))
}
