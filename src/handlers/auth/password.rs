use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    dtos::auth::{
        ChangePasswordRequest, MessageResponse, PasswordResetConfirm, PasswordResetRequest,
    },
    dtos::ErrorResponse,
    handlers::RequestMeta,
    middleware::AuthAccount,
    utils::ValidatedJson,
    AppState,
};
use crate::error::AuthError;

/// Request a password reset link
///
/// The response is uniform whether or not the identifier resolves to an
/// account.
#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Uniform acknowledgment", body = MessageResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorResponse),
        (status = 429, description = "Too many requests", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn request_password_reset(
    State(state): State<AppState>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<PasswordResetRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth
        .request_password_reset(&req.identifier, &meta.origin, meta.client.as_deref())
        .await?;

    Ok(Json(MessageResponse {
        message: "If the account exists, a password reset link has been sent.".to_string(),
    }))
}

/// Complete a password reset with a one-time token
#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    request_body = PasswordResetConfirm,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, description = "Invalid token or unacceptable password", body = ErrorResponse)
    ),
    tag = "Authentication"
)]
pub async fn confirm_password_reset(
    State(state): State<AppState>,
    meta: RequestMeta,
    ValidatedJson(req): ValidatedJson<PasswordResetConfirm>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth
        .reset_password(
            &req.token,
            &req.new_password,
            &meta.origin,
            meta.client.as_deref(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset successfully.".to_string(),
    }))
}

/// Change the authenticated account's password
#[utoipa::path(
    post,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Wrong current password or unacceptable replacement", body = ErrorResponse),
        (status = 401, description = "Not authenticated", body = ErrorResponse)
    ),
    tag = "Authentication",
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<AppState>,
    meta: RequestMeta,
    AuthAccount(account): AuthAccount,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AuthError> {
    state
        .auth
        .change_password(
            &account,
            &req.current_password,
            &req.new_password,
            &meta.origin,
            meta.client.as_deref(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed successfully.".to_string(),
    }))
}
