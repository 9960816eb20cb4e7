use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials, Message,
    SmtpTransport, Transport,
};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::error::AuthError;

/// Out-of-band delivery channel for password-reset tokens.
#[async_trait]
pub trait EmailProvider: Send + Sync {
    async fn send_password_reset(&self, to_email: &str, reset_token: &str)
        -> Result<(), AuthError>;
}

#[derive(Clone)]
pub struct SmtpMailer {
    mailer: SmtpTransport,
    from_address: String,
    reset_base_url: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, AuthError> {
        let creds = Credentials::new(config.user.clone(), config.password.clone());

        let mailer = SmtpTransport::relay(&config.host)
            .map_err(|e| AuthError::Internal(anyhow::anyhow!(e.to_string())))?
            .credentials(creds)
            .timeout(Some(Duration::from_secs(10)))
            .build();

        tracing::info!(host = %config.host, "SMTP mailer initialized");

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            reset_base_url: config.reset_base_url.clone(),
        })
    }
}

#[async_trait]
impl EmailProvider for SmtpMailer {
    async fn send_password_reset(
        &self,
        to_email: &str,
        reset_token: &str,
    ) -> Result<(), AuthError> {
        let reset_link = format!(
            "{}/auth/password-reset/confirm?token={}",
            self.reset_base_url, reset_token
        );

        let body = format!(
            "We received a request to reset your password. Visit the link below to set a new one:\n\n{}\n\nThis link expires in 1 hour. If you didn't request this, ignore this message.",
            reset_link
        );

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e: lettre::address::AddressError| AuthError::Internal(e.into()))?,
            )
            .to(to_email
                .parse()
                .map_err(|e: lettre::address::AddressError| AuthError::Internal(e.into()))?)
            .subject("Reset Your Password")
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AuthError::Internal(e.into()))?;

        // Send on the blocking pool to keep the async runtime clear.
        let mailer = self.mailer.clone();
        let result = tokio::task::spawn_blocking(move || mailer.send(&email))
            .await
            .map_err(|e| AuthError::Internal(e.into()))?;

        match result {
            Ok(_) => {
                tracing::info!(to = %to_email, "Password reset message sent");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e.to_string(), to = %to_email, "Failed to send reset message");
                Err(AuthError::Internal(anyhow::anyhow!(e.to_string())))
            }
        }
    }
}

/// Mailer that records deliveries instead of sending them.
#[derive(Default)]
pub struct MockMailer {
    sent: Mutex<Vec<(String, String)>>,
}

impl MockMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(recipient, reset_token)` pairs in delivery order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmailProvider for MockMailer {
    async fn send_password_reset(
        &self,
        to_email: &str,
        reset_token: &str,
    ) -> Result<(), AuthError> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((to_email.to_string(), reset_token.to_string()));
        Ok(())
    }
}
