use chrono::{Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Account, AdminTier, Role};

const RESET_PURPOSE: &str = "password_reset";

/// Token service for signed, time-limited bearer credentials.
///
/// Keys are derived once from the process-wide signing secret; rotating the
/// secret invalidates every outstanding token.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Claims carried by a session token. Authorization fields are a snapshot
/// taken at issuance; they only change on refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (account ID)
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub tier: Option<AdminTier>,
    pub permissions: HashMap<String, bool>,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Token ID, so two tokens issued in the same second still differ
    pub jti: String,
}

/// Claims carried by a single-purpose password-reset token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetClaims {
    pub sub: Uuid,
    pub purpose: String,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

impl TokenService {
    pub fn new(signing_secret: &str) -> Result<Self, AuthError> {
        if signing_secret.is_empty() {
            return Err(AuthError::Validation(
                "Signing secret must not be empty".to_string(),
            ));
        }

        Ok(Self {
            encoding_key: EncodingKey::from_secret(signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(signing_secret.as_bytes()),
        })
    }

    /// Issue a session token carrying the account's authorization snapshot.
    pub fn issue_session(
        &self,
        account: &Account,
        validity: Duration,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account.id,
            email: account.email.clone(),
            role: account.role,
            tier: account.admin_tier,
            permissions: account.permissions.clone(),
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Verify a session token's signature and expiry.
    ///
    /// An otherwise-valid token past its expiry yields `TokenExpired`;
    /// signature or structure failures yield `TokenInvalid`. Callers use the
    /// distinction for retry behavior: expired means try a refresh, invalid
    /// means force a re-login.
    pub fn verify_session(&self, token: &str) -> Result<SessionClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        match decode::<SessionClaims>(token, &self.decoding_key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.into_kind() {
                ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => Err(AuthError::TokenInvalid),
            },
        }
    }

    /// Issue a purpose-tagged password-reset token.
    pub fn issue_reset(&self, account_id: Uuid, validity: Duration) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = ResetClaims {
            sub: account_id,
            purpose: RESET_PURPOSE.to_string(),
            iat: now.timestamp(),
            exp: (now + validity).timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!("Failed to encode token: {}", e)))
    }

    /// Verify a reset token's signature, purpose tag and expiry. All
    /// verification failures collapse to `ResetTokenInvalid`; a single-use,
    /// short-lived credential needs no finer-grained retry signal.
    pub fn verify_reset(&self, token: &str) -> Result<ResetClaims, AuthError> {
        let validation = Validation::new(Algorithm::HS256);

        let claims = decode::<ResetClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::ResetTokenInvalid)?
            .claims;

        if claims.purpose != RESET_PURPOSE {
            return Err(AuthError::ResetTokenInvalid);
        }

        Ok(claims)
    }
}

/// Hex SHA-256 digest of a token, used as the stored reset-token reference
/// so the raw credential never lands in the user store.
pub fn token_digest(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
