pub mod config;
pub mod dtos;
pub mod handlers;
pub mod hooks;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use service_core::axum::{
    http::{header, HeaderName, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::{request_id_middleware, REQUEST_ID_HEADER},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AccessConfig, Environment};
use crate::hooks::{HookRegistry, TokenHooks, UserHooks, TOKEN, USER};
use crate::services::{
    store::{GrantStore, IdentityStore, PendingStore},
    Clock, CredentialStore, Gatekeeper, GrantDelivery, GrantIssuer, LifecycleService,
    PendingLedger,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::users::signup,
        handlers::users::get_user,
        handlers::users::update_user,
        handlers::users::hide_user,
        handlers::users::delete_user,
        handlers::tokens::login,
        handlers::admin::list_pending,
        handlers::admin::approve_user,
        handlers::admin::reject_user,
        handlers::admin::admin_delete_user,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::access::SignupRequest,
            dtos::access::SignupResponse,
            dtos::access::LoginRequest,
            dtos::access::GrantResponse,
            dtos::access::UpdateUserRequest,
            dtos::access::PendingResponse,
            dtos::access::DecisionResponse,
            dtos::access::MessageResponse,
            models::AccountStatus,
            models::IdentityResponse,
            models::PendingRegistration,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Users", description = "Signup and owner-gated identity management"),
        (name = "Tokens", description = "Login and access grants"),
        (name = "Admin", description = "Registration approval and identity administration"),
        (name = "Observability", description = "Service health"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
            components.add_security_scheme(
                "admin_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-admin-api-key"))),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AccessConfig,
    pub clock: Arc<dyn Clock>,
    pub credentials: CredentialStore,
    pub gatekeeper: Gatekeeper,
    pub lifecycle: LifecycleService,
    pub hooks: HookRegistry,
    pub login_rate_limiter: IpRateLimiter,
    pub signup_rate_limiter: IpRateLimiter,
    pub ip_rate_limiter: IpRateLimiter,
}

impl AppState {
    /// Wire services, hooks and rate limiters over one store backend.
    pub fn build<S>(
        config: AccessConfig,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
        delivery: Arc<dyn GrantDelivery>,
    ) -> Self
    where
        S: IdentityStore + PendingStore + GrantStore + 'static,
    {
        let credentials = CredentialStore::new(store.clone(), clock.clone());
        let ledger = PendingLedger::new(store.clone(), clock.clone());
        let issuer = GrantIssuer::new(
            credentials.clone(),
            store,
            clock.clone(),
            config.grant.transport.clone(),
        )
        .with_expire_after(config.grant.expire_after());
        let gatekeeper = Gatekeeper::new(issuer.clone(), credentials.clone(), clock.clone());
        let lifecycle = LifecycleService::new(
            credentials.clone(),
            ledger,
            issuer.clone(),
            delivery,
            clock.clone(),
        );

        let hooks = HookRegistry::new()
            .register(
                USER,
                Arc::new(UserHooks::new(
                    lifecycle.clone(),
                    gatekeeper.clone(),
                    config.grant.transport.clone(),
                )),
            )
            .register(TOKEN, Arc::new(TokenHooks::new(issuer)));

        let limits = &config.rate_limit;
        let login_rate_limiter =
            create_ip_rate_limiter(limits.login_attempts, limits.login_window_seconds);
        let signup_rate_limiter =
            create_ip_rate_limiter(limits.signup_attempts, limits.signup_window_seconds);
        let ip_rate_limiter =
            create_ip_rate_limiter(limits.global_ip_limit, limits.global_ip_window_seconds);

        Self {
            config,
            clock,
            credentials,
            gatekeeper,
            lifecycle,
            hooks,
            login_rate_limiter,
            signup_rate_limiter,
            ip_rate_limiter,
        }
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let admin_routes = Router::new()
        .route("/admin/pending", get(handlers::admin::list_pending))
        .route(
            "/admin/users/:email/approve",
            post(handlers::admin::approve_user),
        )
        .route(
            "/admin/users/:email/reject",
            post(handlers::admin::reject_user),
        )
        .route(
            "/admin/users/:email",
            delete(handlers::admin::admin_delete_user),
        )
        .layer(from_fn_with_state(
            state.clone(),
            middleware::admin_auth_middleware,
        ));

    let login_route = Router::new()
        .route("/api/tokens", post(handlers::tokens::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let signup_route = Router::new()
        .route("/api/users", post(handlers::users::signup))
        .layer(from_fn_with_state(
            state.signup_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let protected_routes = Router::new()
        .route(
            "/api/users/:email",
            get(handlers::users::get_user)
                .patch(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/api/users/:email/hide", post(handlers::users::hide_user))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::gatekeeper_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    if state.config.environment == Environment::Dev {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let app = app
        .merge(signup_route)
        .merge(login_route)
        .merge(protected_routes)
        .merge(admin_routes)
        .with_state(state.clone())
        .layer(from_fn_with_state(
            state.ip_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &service_core::axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    path = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config));

    Ok(app)
}

fn cors_layer(config: &AccessConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(origin) => Some(origin),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-admin-api-key"),
        ])
        .expose_headers([header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store is unavailable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    service_core::axum::extract::State(state): service_core::axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.credentials.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::from(e)
    })?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "store": "up"
        }
    })))
}
