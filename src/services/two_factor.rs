use async_trait::async_trait;

use crate::error::AuthError;
use crate::models::Account;

/// Second-factor capability seam.
///
/// The auth service consults this after the primary secret verifies. A real
/// TOTP/WebAuthn implementation can be substituted without touching any
/// call site; the default reports not-enabled for every account.
#[async_trait]
pub trait TwoFactor: Send + Sync {
    fn is_enabled(&self, account: &Account) -> bool;

    async fn begin_enrollment(&self, account: &Account) -> Result<TwoFactorEnrollment, AuthError>;

    async fn verify_code(&self, account: &Account, code: &str) -> Result<bool, AuthError>;
}

#[derive(Debug, Clone)]
pub struct TwoFactorEnrollment {
    pub secret: String,
    pub otpauth_url: String,
}

/// Default implementation: the capability is switched off.
pub struct TwoFactorDisabled;

#[async_trait]
impl TwoFactor for TwoFactorDisabled {
    fn is_enabled(&self, _account: &Account) -> bool {
        false
    }

    async fn begin_enrollment(
        &self,
        _account: &Account,
    ) -> Result<TwoFactorEnrollment, AuthError> {
        Err(AuthError::Validation(
            "Two-factor authentication is not available".to_string(),
        ))
    }

    async fn verify_code(&self, _account: &Account, _code: &str) -> Result<bool, AuthError> {
        Err(AuthError::Validation(
            "Two-factor authentication is not available".to_string(),
        ))
    }
}
