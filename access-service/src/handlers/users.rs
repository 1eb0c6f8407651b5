use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::access::{MessageResponse, SignupRequest, SignupResponse, UpdateUserRequest},
    handlers::identity_outcome,
    hooks::{ContentFields, HookContext, USER},
    middleware::AuthGrant,
    models::IdentityResponse,
    utils::ValidatedJson,
    AppState,
};

/// Sign up for an account awaiting administrator approval
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Registration received", body = SignupResponse),
        (status = 409, description = "Email already registered or pending", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse),
        (status = 429, description = "Too many signups", body = ErrorResponse)
    ),
    tag = "Users"
)]
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<SignupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, req.email.clone())
        .with_fields(ContentFields::Signup(req));
    hooks.before_create(&mut ctx).await?;
    let identity = identity_outcome(ctx.outcome.take())?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            email: identity.email,
            account_status: identity.account_status,
            message: "Registration received. An administrator will review it shortly."
                .to_string(),
        }),
    ))
}

/// Get an identity
///
/// Hidden identities are only visible to their owner.
#[utoipa::path(
    get,
    path = "/api/users/{email}",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Identity", body = IdentityResponse),
        (status = 401, description = "Missing or invalid grant", body = ErrorResponse),
        (status = 404, description = "Identity not found", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<AppState>,
    AuthGrant(grant): AuthGrant,
    Path(email): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let identity = state.lifecycle.view(&email, &grant).await?;
    Ok(Json(identity.sanitized()))
}

/// Update own profile
#[utoipa::path(
    patch,
    path = "/api/users/{email}",
    params(("email" = String, Path, description = "Identity email")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Profile updated", body = IdentityResponse),
        (status = 400, description = "No changes supplied", body = ErrorResponse),
        (status = 401, description = "Missing or invalid grant", body = ErrorResponse),
        (status = 403, description = "Grant is not owner of identity", body = ErrorResponse),
        (status = 422, description = "Validation error", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn update_user(
    State(state): State<AppState>,
    AuthGrant(grant): AuthGrant,
    Path(email): Path<String>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx = HookContext::new(&headers, &mut response_headers, email)
        .with_fields(ContentFields::Profile(req))
        .with_caller(Some(grant));
    hooks.before_update(&mut ctx).await?;
    let identity = identity_outcome(ctx.outcome.take())?;

    Ok(Json(IdentityResponse::from(identity)))
}

/// Hide own identity from other users
#[utoipa::path(
    post,
    path = "/api/users/{email}/hide",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Identity hidden", body = MessageResponse),
        (status = 401, description = "Missing or invalid grant", body = ErrorResponse),
        (status = 403, description = "Grant is not owner of identity", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn hide_user(
    State(state): State<AppState>,
    AuthGrant(grant): AuthGrant,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx =
        HookContext::new(&headers, &mut response_headers, email).with_caller(Some(grant));
    hooks.hide(&mut ctx).await?;

    Ok(Json(MessageResponse {
        message: "Identity hidden".to_string(),
    }))
}

/// Delete own identity
///
/// Revokes the caller's grant.
#[utoipa::path(
    delete,
    path = "/api/users/{email}",
    params(("email" = String, Path, description = "Identity email")),
    responses(
        (status = 200, description = "Identity deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid grant", body = ErrorResponse),
        (status = 403, description = "Grant is not owner of identity", body = ErrorResponse)
    ),
    tag = "Users",
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthGrant(grant): AuthGrant,
    Path(email): Path<String>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let hooks = state.hooks.get(USER)?;
    let mut response_headers = HeaderMap::new();

    let mut ctx =
        HookContext::new(&headers, &mut response_headers, email).with_caller(Some(grant));
    hooks.after_delete(&mut ctx).await?;

    Ok((
        response_headers,
        Json(MessageResponse {
            message: "Identity deleted".to_string(),
        }),
    ))
}
