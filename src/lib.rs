pub mod config;
pub mod dtos;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod store;
pub mod utils;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{AuthConfig, SwaggerMode};
use crate::error::AuthError;
use crate::middleware::SlidingWindowLimiter;
use crate::services::AuthService;
use crate::store::UserStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        handlers::auth::session::login,
        handlers::auth::session::logout,
        handlers::auth::session::verify,
        handlers::auth::session::refresh,
        handlers::auth::password::request_password_reset,
        handlers::auth::password::confirm_password_reset,
        handlers::auth::password::change_password,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::auth::LoginRequest,
            dtos::auth::LoginResponse,
            dtos::auth::VerifyResponse,
            dtos::auth::MessageResponse,
            dtos::auth::PasswordResetRequest,
            dtos::auth::PasswordResetConfirm,
            dtos::auth::ChangePasswordRequest,
            models::SanitizedAccount,
            models::Role,
            models::AdminTier,
            models::AccountStatus,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Operator authentication and session management"),
        (name = "Observability", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: AuthConfig,
    pub store: Arc<dyn UserStore>,
    pub auth: AuthService,
    pub limiter: SlidingWindowLimiter,
}

pub async fn build_router(state: AppState) -> Result<Router, AuthError> {
    // Routes that require an authenticated caller.
    let protected_routes = Router::new()
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/password", post(handlers::auth::change_password))
        .layer(from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    // The whole auth surface sits behind the per-origin sliding window.
    let auth_routes = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/verify", get(handlers::auth::verify))
        .route("/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/auth/password-reset/request",
            post(handlers::auth::request_password_reset),
        )
        .route(
            "/auth/password-reset/confirm",
            post(handlers::auth::confirm_password_reset),
        )
        .merge(protected_routes)
        .layer(from_fn_with_state(
            state.limiter.clone(),
            middleware::rate_limit_middleware,
        ));

    let mut app = Router::new().route("/health", get(health_check));

    if state.config.swagger.enabled == SwaggerMode::Public {
        app = app.merge(
            SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()),
        );
    }

    let app = app
        .merge(auth_routes)
        .with_state(state.clone())
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }),
        )
        .layer(
            CorsLayer::new()
                .allow_origin(
                    state
                        .config
                        .security
                        .allowed_origins
                        .iter()
                        .filter_map(|origin| {
                            origin
                                .parse::<axum::http::HeaderValue>()
                                .map_err(|e| {
                                    tracing::error!(origin = %origin, error = %e, "Invalid CORS origin");
                                    e
                                })
                                .ok()
                        })
                        .collect::<Vec<axum::http::HeaderValue>>(),
                )
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::AUTHORIZATION,
                    axum::http::header::CONTENT_TYPE,
                ]),
        );

    Ok(app)
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 500, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Result<Json<serde_json::Value>, AuthError> {
    state.store.health_check().await?;

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
    })))
}
