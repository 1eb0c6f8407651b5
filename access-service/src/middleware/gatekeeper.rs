use axum::{
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use service_core::error::AppError;

use crate::{dtos::ErrorResponse, models::Grant, AppState};

/// Require a valid access grant and stash it in request extensions.
pub async fn gatekeeper_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let grant = state.gatekeeper.validate(req.headers()).await.map_err(|e| {
        tracing::debug!(path = %req.uri().path(), "Rejected request without valid grant");
        AppError::from(e)
    })?;

    req.extensions_mut().insert(grant);
    Ok(next.run(req).await)
}

/// The grant validated by [`gatekeeper_middleware`].
pub struct AuthGrant(pub Grant);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthGrant
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let grant = parts.extensions.get::<Grant>().ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Access grant missing from request extensions".to_string(),
                }),
            )
                .into_response()
        })?;

        Ok(AuthGrant(grant.clone()))
    }
}
