use serde::Deserialize;
use std::env;

use crate::error::AuthError;

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub token: TokenConfig,
    pub lockout: LockoutConfig,
    pub rate_limit: RateLimitConfig,
    pub password: PasswordConfig,
    pub smtp: SmtpConfig,
    pub security: SecurityConfig,
    pub swagger: SwaggerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// Process-wide signing secret. Rotating it invalidates every
    /// outstanding session and reset token.
    pub signing_secret: String,
    pub session_ttl_seconds: i64,
    pub reset_ttl_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LockoutConfig {
    pub max_failed_attempts: i32,
    pub lock_duration_seconds: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub min_length: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub user: String,
    pub password: String,
    pub from_address: String,
    /// Base URL embedded in password-reset links.
    pub reset_base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SwaggerConfig {
    pub enabled: SwaggerMode,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SwaggerMode {
    Public,
    Disabled,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, AuthError> {
        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AuthError::Validation(e))?;

        let is_prod = environment == Environment::Prod;

        let config = AuthConfig {
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("admin-auth"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            port: parse_env("PORT", Some("8080"), is_prod)?,
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", None, is_prod)?,
            },
            token: TokenConfig {
                signing_secret: get_env(
                    "TOKEN_SIGNING_SECRET",
                    Some("dev-signing-secret-change-me"),
                    is_prod,
                )?,
                session_ttl_seconds: parse_env("SESSION_TOKEN_TTL_SECONDS", Some("604800"), is_prod)?,
                reset_ttl_seconds: parse_env("RESET_TOKEN_TTL_SECONDS", Some("3600"), is_prod)?,
            },
            lockout: LockoutConfig {
                max_failed_attempts: parse_env("LOCKOUT_MAX_FAILED_ATTEMPTS", Some("5"), is_prod)?,
                lock_duration_seconds: parse_env("LOCKOUT_DURATION_SECONDS", Some("1800"), is_prod)?,
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_env("RATE_LIMIT_MAX_REQUESTS", Some("100"), is_prod)?,
                window_seconds: parse_env("RATE_LIMIT_WINDOW_SECONDS", Some("900"), is_prod)?,
            },
            password: PasswordConfig {
                min_length: parse_env("PASSWORD_MIN_LENGTH", Some("8"), is_prod)?,
            },
            smtp: SmtpConfig {
                host: get_env("SMTP_HOST", Some("localhost"), is_prod)?,
                user: get_env("SMTP_USER", Some(""), is_prod)?,
                password: get_env("SMTP_PASSWORD", Some(""), is_prod)?,
                from_address: get_env("SMTP_FROM_ADDRESS", Some("no-reply@localhost"), is_prod)?,
                reset_base_url: get_env(
                    "RESET_BASE_URL",
                    Some("http://localhost:3000"),
                    is_prod,
                )?,
            },
            security: SecurityConfig {
                allowed_origins: get_env("ALLOWED_ORIGINS", Some("http://localhost:3000"), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
            },
            swagger: SwaggerConfig {
                enabled: get_env("ENABLE_SWAGGER", Some("public"), is_prod)?
                    .parse()
                    .map_err(|e: String| AuthError::Validation(e))?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AuthError> {
        if self.port == 0 {
            return Err(AuthError::Validation(
                "PORT must be greater than 0".to_string(),
            ));
        }

        if self.token.signing_secret.is_empty() {
            return Err(AuthError::Validation(
                "TOKEN_SIGNING_SECRET must not be empty".to_string(),
            ));
        }

        if self.token.session_ttl_seconds <= 0 || self.token.reset_ttl_seconds <= 0 {
            return Err(AuthError::Validation(
                "Token TTLs must be positive".to_string(),
            ));
        }

        if self.lockout.max_failed_attempts <= 0 {
            return Err(AuthError::Validation(
                "LOCKOUT_MAX_FAILED_ATTEMPTS must be positive".to_string(),
            ));
        }

        if self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds == 0 {
            return Err(AuthError::Validation(
                "Rate limit quota and window must be positive".to_string(),
            ));
        }

        if self.environment == Environment::Prod {
            if self.token.signing_secret == "dev-signing-secret-change-me" {
                return Err(AuthError::Validation(
                    "TOKEN_SIGNING_SECRET must be set explicitly in production".to_string(),
                ));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AuthError::Validation(
                    "Wildcard CORS origin not allowed in production".to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AuthError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AuthError::Validation(format!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AuthError::Validation(format!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(
    key: &str,
    default: Option<&str>,
    is_prod: bool,
) -> Result<T, AuthError>
where
    T::Err: std::fmt::Display,
{
    get_env(key, default, is_prod)?
        .parse()
        .map_err(|e: T::Err| AuthError::Validation(format!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

impl std::str::FromStr for SwaggerMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "public" => Ok(SwaggerMode::Public),
            "disabled" => Ok(SwaggerMode::Disabled),
            _ => Err(format!("Invalid swagger mode: {}", s)),
        }
    }
}
