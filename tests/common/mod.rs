#![allow(dead_code)]

use admin_auth::{
    config::{
        AuthConfig, DatabaseConfig, Environment, LockoutConfig, PasswordConfig, RateLimitConfig,
        SecurityConfig, SmtpConfig, SwaggerConfig, SwaggerMode, TokenConfig,
    },
    middleware::SlidingWindowLimiter,
    models::{Account, AdminTier, Role},
    services::{
        AuditRecorder, AuthService, LockoutTracker, MockMailer, TokenService, TwoFactorDisabled,
    },
    store::{MemoryAuditSink, MemoryStore, UserStore},
    AppState,
};
use std::sync::Arc;
use std::time::Duration;

pub struct TestHarness {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub sink: Arc<MemoryAuditSink>,
    pub mailer: Arc<MockMailer>,
}

pub fn test_config() -> AuthConfig {
    AuthConfig {
        environment: Environment::Dev,
        service_name: "admin-auth".to_string(),
        service_version: "test".to_string(),
        log_level: "error".to_string(),
        port: 8080,
        database: DatabaseConfig {
            url: "postgres://unused-in-tests".to_string(),
        },
        token: TokenConfig {
            signing_secret: "test-signing-secret".to_string(),
            session_ttl_seconds: 604_800,
            reset_ttl_seconds: 3600,
        },
        lockout: LockoutConfig {
            max_failed_attempts: 5,
            lock_duration_seconds: 1800,
        },
        rate_limit: RateLimitConfig {
            max_requests: 100,
            window_seconds: 900,
        },
        password: PasswordConfig { min_length: 8 },
        smtp: SmtpConfig {
            host: "localhost".to_string(),
            user: String::new(),
            password: String::new(),
            from_address: "no-reply@localhost".to_string(),
            reset_base_url: "http://localhost:3000".to_string(),
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
        swagger: SwaggerConfig {
            enabled: SwaggerMode::Disabled,
        },
    }
}

pub fn build_harness(config: AuthConfig) -> TestHarness {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(MemoryAuditSink::new());
    let mailer = Arc::new(MockMailer::new());

    let tokens = TokenService::new(&config.token.signing_secret).unwrap();
    let lockout = LockoutTracker::new(store.clone(), &config.lockout);
    let audit = AuditRecorder::new(sink.clone());

    let auth = AuthService::new(
        store.clone(),
        tokens,
        lockout,
        audit,
        mailer.clone(),
        Arc::new(TwoFactorDisabled),
        &config,
    );

    let limiter = SlidingWindowLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_seconds),
    );

    let state = AppState {
        config,
        store: store.clone(),
        auth,
        limiter,
    };

    TestHarness {
        state,
        store,
        sink,
        mailer,
    }
}

pub fn harness() -> TestHarness {
    build_harness(test_config())
}

pub async fn seed_admin(
    store: &MemoryStore,
    email: &str,
    password: &str,
    tier: Option<AdminTier>,
    permissions: &[(&str, bool)],
) -> Account {
    let hash = admin_auth::utils::hash_password(&admin_auth::utils::Password::new(password))
        .unwrap()
        .into_string();

    let mut account = Account::new(email, "Test Admin", hash, Role::Admin, tier);
    for (permission, granted) in permissions {
        account.permissions.insert(permission.to_string(), *granted);
    }

    store.insert(&account).await.unwrap();
    account
}
