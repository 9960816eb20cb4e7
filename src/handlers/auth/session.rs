use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    dtos::auth::{LoginRequest, LoginResponse, MessageResponse, VerifyResponse},
    dtos::ErrorResponse,
    handlers::RequestMeta,
    middleware::{bearer_token, AuthAccount, SESSION_COOKIE},
    services::AuthSuccess,
    utils::ValidatedJson,
    AppState,
};
use crate::error::AuthError;

fn session_cookie(token: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn login_response(state: &AppState, success: AuthSuccess, jar: CookieJar) -> impl IntoResponse {
    let jar = jar.add(session_cookie(&success.token));
    let body = LoginResponse {
        token: success.token,
        token_type: "Bearer".to_string(),
        expires_in: state.auth.session_ttl_seconds(),
        account: success.account.sanitized(),
    };
    (jar, Json(body))
}

/// Login with identifier and password
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorResponse),
        (status = 401, description = "Invalid credentials, locked or inactive account", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<impl IntoResponse, AuthError> {
    let success = state
        .auth
        .login(
            &req.identifier,
            &req.password,
            &meta.origin,
            meta.client.as_deref(),
        )
        .await?;

    Ok(login_response(&state, success, jar))
}

/// Logout and clear the session cookie
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logged out successfully", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    meta: RequestMeta,
    AuthAccount(account): AuthAccount,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth
        .logout(&account, &meta.origin, meta.client.as_deref())
        .await?;

    let jar = jar.remove(session_cookie(""));

    Ok((
        jar,
        Json(MessageResponse {
            message: "Logged out successfully".to_string(),
        }),
    ))
}

/// Verify the presented bearer token
#[utoipa::path(
    get,
    path = "/auth/verify",
    responses(
        (status = 200, description = "Token is valid", body = VerifyResponse),
        (status = 401, description = "Token missing, invalid or expired", body = VerifyResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn verify(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> impl IntoResponse {
    let verified = match bearer_token(&headers, &jar) {
        Some(token) => state.auth.verify_auth(&token).await.ok(),
        None => None,
    };

    match verified {
        Some(account) => (
            StatusCode::OK,
            Json(VerifyResponse {
                authenticated: true,
                account: Some(account.sanitized()),
            }),
        ),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(VerifyResponse {
                authenticated: false,
                account: None,
            }),
        ),
    }
}

/// Exchange a valid token for a fresh one with a current claims snapshot
#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Token refreshed", body = LoginResponse),
        (status = 401, description = "Token missing, invalid or expired", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    meta: RequestMeta,
) -> Result<impl IntoResponse, AuthError> {
    let token = bearer_token(&headers, &jar).ok_or(AuthError::MissingToken)?;

    let success = state
        .auth
        .refresh_token(&token, &meta.origin, meta.client.as_deref())
        .await?;

    Ok(login_response(&state, success, jar))
}
