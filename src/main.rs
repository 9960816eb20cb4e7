use admin_auth::{
    build_router,
    config::{AuthConfig, Environment},
    error::AuthError,
    middleware::SlidingWindowLimiter,
    services::{AuditRecorder, AuthService, LockoutTracker, SmtpMailer, TokenService, TwoFactorDisabled},
    store::PgStore,
    AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), AuthError> {
    dotenvy::dotenv().ok();

    // Load configuration - fail fast if invalid
    let config = AuthConfig::from_env()?;

    init_tracing(&config);

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting authentication service"
    );

    let store = PgStore::connect(&config.database.url).await?;
    store.init_schema().await?;
    let store = Arc::new(store);
    tracing::info!("Store initialized");

    let tokens = TokenService::new(&config.token.signing_secret)?;
    let lockout = LockoutTracker::new(store.clone(), &config.lockout);
    let audit = AuditRecorder::new(store.clone());
    let email = Arc::new(SmtpMailer::new(&config.smtp)?);

    let auth = AuthService::new(
        store.clone(),
        tokens,
        lockout,
        audit,
        email,
        Arc::new(TwoFactorDisabled),
        &config,
    );

    let limiter = SlidingWindowLimiter::new(
        config.rate_limit.max_requests,
        Duration::from_secs(config.rate_limit.window_seconds),
    );

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        auth,
        limiter,
    };

    let app = build_router(state).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(address = %addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AuthError::Internal(e.into()))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| AuthError::Internal(e.into()))?;

    tracing::info!("Service shutdown complete");
    Ok(())
}

fn init_tracing(config: &AuthConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.environment == Environment::Prod {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .flatten_event(true),
            )
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
