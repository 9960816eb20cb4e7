use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;

use crate::error::AuthError;
use crate::models::{Account, AdminTier};
use crate::AppState;

/// Cookie carrying the session token when the Authorization header is not
/// used. The header always takes precedence.
pub const SESSION_COOKIE: &str = "session_token";

/// Resolved caller attached to the request after authentication, for
/// downstream gates and handlers.
#[derive(Clone)]
pub struct AuthContext {
    pub account: Account,
}

/// Extract the bearer token: Authorization header first, cookie second.
pub fn bearer_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::to_string)
        .or_else(|| jar.get(SESSION_COOKIE).map(|c| c.value().to_string()))
}

/// Middleware to require an authenticated, active, privileged account.
pub async fn auth_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let token = bearer_token(req.headers(), &jar).ok_or(AuthError::MissingToken)?;

    let account = state.auth.verify_auth(&token).await?;

    req.extensions_mut().insert(AuthContext { account });

    Ok(next.run(req).await)
}

/// Extractor to get the authenticated account in handlers.
pub struct AuthAccount(pub Account);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthAccount
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts.extensions.get::<AuthContext>().ok_or_else(|| {
            AuthError::Internal(anyhow::anyhow!(
                "Auth context missing from request extensions"
            ))
        })?;

        Ok(AuthAccount(ctx.account.clone()))
    }
}

/// Permission requirement for a protected operation. Semantics are ANY-of:
/// holding at least one of the listed permissions grants access.
#[derive(Clone)]
pub struct PermissionPolicy {
    pub any_of: Vec<String>,
}

impl PermissionPolicy {
    pub fn any_of(permissions: &[&str]) -> Self {
        Self {
            any_of: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Gate on named permissions. A `Super`-tier admin bypasses the check
/// entirely. Runs after `auth_middleware`; rejections are 403, distinct
/// from the unauthenticated 401.
pub async fn permission_gate(
    State(policy): State<PermissionPolicy>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let account = &context(&req)?.account;

    if account.admin_tier == Some(AdminTier::Super) {
        return Ok(next.run(req).await);
    }

    let granted = policy.any_of.iter().any(|p| account.has_permission(p));
    if !granted {
        tracing::warn!(
            account_id = %account.id,
            required_any_of = ?policy.any_of,
            "Permission gate rejected request"
        );
        return Err(AuthError::PermissionDenied(
            "Missing required permission".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// Minimum admin tier for a protected operation.
#[derive(Clone)]
pub struct TierPolicy {
    pub minimum: AdminTier,
}

/// Gate on the ordered admin tier.
pub async fn tier_gate(
    State(policy): State<TierPolicy>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let account = &context(&req)?.account;

    match account.admin_tier {
        Some(tier) if tier >= policy.minimum => Ok(next.run(req).await),
        _ => {
            tracing::warn!(
                account_id = %account.id,
                minimum = %policy.minimum.as_str(),
                "Tier gate rejected request"
            );
            Err(AuthError::PermissionDenied(
                "Insufficient admin tier".to_string(),
            ))
        }
    }
}

fn context(req: &Request) -> Result<&AuthContext, AuthError> {
    req.extensions().get::<AuthContext>().ok_or_else(|| {
        AuthError::Internal(anyhow::anyhow!(
            "Authorization gate ran before authentication"
        ))
    })
}
