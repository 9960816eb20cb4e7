use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::AuthError;

/// Newtype for plaintext secrets to prevent accidental logging.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for stored password hashes.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password using Argon2id with a fresh random salt.
///
/// Empty input is rejected; everything else hashes.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, AuthError> {
    if password.as_str().is_empty() {
        return Err(AuthError::Validation(
            "Password must not be empty".to_string(),
        ));
    }

    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to hash password: {}", e)))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

/// Verify a password against a stored hash.
///
/// Returns `Ok(false)` on a mismatch; errs only when the stored hash itself
/// is malformed, which is a data-integrity fault rather than a user error.
pub fn verify_password(
    password: &Password,
    password_hash: &PasswordHashString,
) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(password_hash.as_str()).map_err(|e| {
        tracing::error!(error = %e, "Stored password hash failed to parse");
        AuthError::CorruptCredential
    })?;

    match Argon2::default().verify_password(password.as_str().as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => {
            tracing::error!(error = %e, "Password verification failed on stored hash");
            Err(AuthError::CorruptCredential)
        }
    }
}
