use chrono::{Duration, Utc};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::models::{Account, AuditEvent, LockoutState};
use crate::services::token::token_digest;
use crate::services::{AuditRecorder, EmailProvider, LockoutTracker, TokenService, TwoFactor};
use crate::store::UserStore;
use crate::utils::{hash_password, verify_password, Password, PasswordHashString};

/// Terminal success state of a login or refresh: a bearer token plus the
/// account it was issued for.
pub struct AuthSuccess {
    pub token: String,
    pub account: Account,
}

/// Orchestrates login, logout, refresh, password reset and password change.
///
/// Every failure is converted to an `AuthError` kind before it leaves this
/// boundary, and every login/reset outcome - success or failure - produces
/// exactly one audit record.
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    tokens: TokenService,
    lockout: LockoutTracker,
    audit: AuditRecorder,
    email: Arc<dyn EmailProvider>,
    two_factor: Arc<dyn TwoFactor>,
    session_ttl: Duration,
    reset_ttl: Duration,
    min_password_length: usize,
}

impl AuthService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn UserStore>,
        tokens: TokenService,
        lockout: LockoutTracker,
        audit: AuditRecorder,
        email: Arc<dyn EmailProvider>,
        two_factor: Arc<dyn TwoFactor>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            store,
            tokens,
            lockout,
            audit,
            email,
            two_factor,
            session_ttl: Duration::seconds(config.token.session_ttl_seconds),
            reset_ttl: Duration::seconds(config.token.reset_ttl_seconds),
            min_password_length: config.password.min_length,
        }
    }

    pub fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl.num_seconds()
    }

    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Result<AuthSuccess, AuthError> {
        let identifier = identifier.trim().to_lowercase();

        let mut account = match self.store.find_by_email(&identifier).await? {
            Some(account) => account,
            None => {
                // Indistinguishable from a wrong password on the outside.
                self.audit
                    .record(AuditEvent::login_failed(
                        None,
                        &identifier,
                        "unknown identifier",
                        origin,
                        client,
                    ))
                    .await;
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !account.role.is_privileged() {
            self.audit
                .record(AuditEvent::login_failed(
                    Some(&account),
                    &identifier,
                    "insufficient privilege",
                    origin,
                    client,
                ))
                .await;
            return Err(AuthError::InsufficientPrivilege);
        }

        if self.lockout.is_locked(&account) {
            self.audit
                .record(AuditEvent::login_failed(
                    Some(&account),
                    &identifier,
                    "account locked",
                    origin,
                    client,
                ))
                .await;
            return Err(AuthError::AccountLocked);
        }

        if !account.status.allows_login() {
            self.audit
                .record(AuditEvent::login_failed(
                    Some(&account),
                    &identifier,
                    &format!("account not active ({})", account.status.as_str()),
                    origin,
                    client,
                ))
                .await;
            return Err(AuthError::AccountNotActive(
                account.status.as_str().to_string(),
            ));
        }

        let verified = match verify_password(
            &Password::new(password),
            &PasswordHashString::new(account.password_hash.clone()),
        ) {
            Ok(verified) => verified,
            Err(e) => {
                self.audit
                    .record(AuditEvent::login_failed(
                        Some(&account),
                        &identifier,
                        "stored credential corrupt",
                        origin,
                        client,
                    ))
                    .await;
                return Err(e);
            }
        };

        if !verified {
            let state = self.lockout.record_failure(account.id).await?;
            let metadata = match state {
                LockoutState::Locked { until } => {
                    serde_json::json!({ "identifier": identifier, "reason": "wrong password", "locked_until": until })
                }
                LockoutState::Unlocked { failed_attempts } => {
                    serde_json::json!({ "identifier": identifier, "reason": "wrong password", "failed_attempts": failed_attempts })
                }
            };
            self.audit
                .record(
                    AuditEvent::login_failed(
                        Some(&account),
                        &identifier,
                        "wrong password",
                        origin,
                        client,
                    )
                    .with_metadata(metadata),
                )
                .await;
            return Err(AuthError::InvalidCredentials);
        }

        if self.two_factor.is_enabled(&account) {
            // Placeholder contract: a real implementation challenges the
            // second factor here instead of failing the login.
            self.audit
                .record(AuditEvent::login_failed(
                    Some(&account),
                    &identifier,
                    "second factor required",
                    origin,
                    client,
                ))
                .await;
            return Err(AuthError::AuthenticationFailed(
                "Second-factor verification required".to_string(),
            ));
        }

        self.lockout.record_success(account.id).await?;

        let now = Utc::now();
        self.store.record_login(account.id, now).await?;
        account.failed_attempts = 0;
        account.locked_until = None;
        account.stats.login_count += 1;
        account.stats.last_login = Some(now);
        account.stats.last_activity = Some(now);

        let token = self.tokens.issue_session(&account, self.session_ttl)?;

        tracing::info!(account_id = %account.id, "Login succeeded");
        self.audit
            .record(AuditEvent::login_success(&account, origin, client))
            .await;

        Ok(AuthSuccess { token, account })
    }

    /// Validate a presented session token and resolve its account.
    ///
    /// All failures collapse to `AuthenticationFailed` with an embedded
    /// reason; callers see one kind, logs see the detail.
    pub async fn verify_auth(&self, token: &str) -> Result<Account, AuthError> {
        let claims = self
            .tokens
            .verify_session(token)
            .map_err(|e| AuthError::AuthenticationFailed(e.to_string()))?;

        let account = self
            .store
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| AuthError::AuthenticationFailed("Account not found".to_string()))?;

        if !account.role.is_privileged() {
            return Err(AuthError::AuthenticationFailed(
                "Account lacks the required privilege".to_string(),
            ));
        }

        if account.status != crate::models::AccountStatus::Active || !account.is_active {
            return Err(AuthError::AuthenticationFailed(
                "Account is not active".to_string(),
            ));
        }

        self.store.touch_activity(account.id, Utc::now()).await?;

        Ok(account)
    }

    /// Record a logout. No token denylist is maintained: the token stays
    /// valid until its natural expiry, and logout is an audit event plus
    /// client-side cleanup.
    pub async fn logout(
        &self,
        account: &Account,
        origin: &str,
        client: Option<&str>,
    ) -> Result<(), AuthError> {
        self.store.touch_activity(account.id, Utc::now()).await?;
        self.audit
            .record(AuditEvent::logout(account, origin, client))
            .await;
        Ok(())
    }

    /// Exchange a still-valid token for a fresh one carrying a current
    /// authorization snapshot. This is the only path on which permission
    /// changes propagate into a token.
    pub async fn refresh_token(
        &self,
        token: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Result<AuthSuccess, AuthError> {
        let account = self.verify_auth(token).await?;

        let fresh = self.tokens.issue_session(&account, self.session_ttl)?;
        self.audit
            .record(AuditEvent::token_refreshed(&account, origin, client))
            .await;

        Ok(AuthSuccess {
            token: fresh,
            account,
        })
    }

    /// Always reports success to the caller so identifiers cannot be
    /// enumerated; the actual work only happens for accounts that exist.
    pub async fn request_password_reset(
        &self,
        identifier: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Result<(), AuthError> {
        let identifier = identifier.trim().to_lowercase();

        let account = self.store.find_by_email(&identifier).await?;

        if let Some(account) = &account {
            let token = self.tokens.issue_reset(account.id, self.reset_ttl)?;
            let expires = Utc::now() + self.reset_ttl;

            self.store
                .set_reset_request(account.id, &token_digest(&token), expires)
                .await?;

            // A failed send must not surface: the caller response is
            // uniform whether or not the account exists.
            if let Err(e) = self.email.send_password_reset(&account.email, &token).await {
                tracing::error!(
                    error = %e,
                    account_id = %account.id,
                    "Failed to dispatch password reset message"
                );
            }
        }

        self.audit
            .record(AuditEvent::password_reset_requested(
                account.as_ref(),
                &identifier,
                origin,
                client,
            ))
            .await;

        Ok(())
    }

    /// Consume a reset token. The token is only honored while the decoded
    /// account, the stored reference and the stored expiry all agree; a
    /// token that verifies cryptographically but was superseded by a newer
    /// request fails.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Result<(), AuthError> {
        let claims = match self.tokens.verify_reset(token) {
            Ok(claims) => claims,
            Err(e) => {
                self.audit
                    .record(AuditEvent::password_reset_failed(
                        None,
                        "token verification failed",
                        origin,
                        client,
                    ))
                    .await;
                return Err(e);
            }
        };

        let account = match self.store.find_by_id(claims.sub).await? {
            Some(account) => account,
            None => {
                self.audit
                    .record(AuditEvent::password_reset_failed(
                        None,
                        "account not found",
                        origin,
                        client,
                    ))
                    .await;
                return Err(AuthError::ResetTokenInvalid);
            }
        };

        let stored = account
            .reset_token_hash
            .as_deref()
            .zip(account.reset_token_expires);

        let honored = match stored {
            Some((stored_hash, stored_expires)) => {
                digests_match(stored_hash, &token_digest(token)) && stored_expires > Utc::now()
            }
            None => false,
        };

        if !honored {
            self.audit
                .record(AuditEvent::password_reset_failed(
                    Some(&account),
                    "token does not match outstanding reset",
                    origin,
                    client,
                ))
                .await;
            return Err(AuthError::ResetTokenInvalid);
        }

        if let Err(e) = self.check_password_length(new_password) {
            self.audit
                .record(AuditEvent::password_reset_failed(
                    Some(&account),
                    "replacement password too short",
                    origin,
                    client,
                ))
                .await;
            return Err(e);
        }

        let hash = hash_password(&Password::new(new_password))?;
        self.store
            .complete_password_reset(account.id, hash.as_str())
            .await?;

        tracing::info!(account_id = %account.id, "Password reset completed");
        self.audit
            .record(AuditEvent::password_reset_completed(&account, origin, client))
            .await;

        Ok(())
    }

    pub async fn change_password(
        &self,
        account: &Account,
        current_password: &str,
        new_password: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Result<(), AuthError> {
        let verified = verify_password(
            &Password::new(current_password),
            &PasswordHashString::new(account.password_hash.clone()),
        )?;

        if !verified {
            self.audit
                .record(AuditEvent::password_change_failed(account, origin, client))
                .await;
            return Err(AuthError::CurrentPasswordIncorrect);
        }

        self.check_password_length(new_password)?;

        let hash = hash_password(&Password::new(new_password))?;
        self.store.set_password_hash(account.id, hash.as_str()).await?;

        tracing::info!(account_id = %account.id, "Password changed");
        self.audit
            .record(AuditEvent::password_changed(account, origin, client))
            .await;

        Ok(())
    }

    fn check_password_length(&self, password: &str) -> Result<(), AuthError> {
        if password.chars().count() < self.min_password_length {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                self.min_password_length
            )));
        }
        Ok(())
    }
}

fn digests_match(stored: &str, candidate: &str) -> bool {
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}
