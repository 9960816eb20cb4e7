//! Audit event model - security and compliance logging.
//!
//! Events are append-only: created exactly once per security-relevant
//! action, including failures, and never updated or deleted by application
//! code (retention expiry only).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Account;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Authentication,
    Security,
    UserManagement,
    System,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditCategory::Authentication => "authentication",
            AuditCategory::Security => "security",
            AuditCategory::UserManagement => "user_management",
            AuditCategory::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AuditSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSeverity::Low => "low",
            AuditSeverity::Medium => "medium",
            AuditSeverity::High => "high",
            AuditSeverity::Critical => "critical",
        }
    }
}

/// Immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub id: Uuid,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<Uuid>,
    /// Absent for anonymous or failed authentication attempts.
    pub actor_id: Option<Uuid>,
    pub actor_role: Option<String>,
    pub description: String,
    pub origin: String,
    pub client: Option<String>,
    pub category: AuditCategory,
    pub severity: AuditSeverity,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    /// Retention horizon; enforced by the sink, not application code.
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuditEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        action: impl Into<String>,
        category: AuditCategory,
        severity: AuditSeverity,
        description: impl Into<String>,
        origin: impl Into<String>,
        client: Option<&str>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action: action.into(),
            target_type: "account".to_string(),
            target_id: None,
            actor_id: None,
            actor_role: None,
            description: description.into(),
            origin: origin.into(),
            client: client.map(|s| s.to_string()),
            category,
            severity,
            metadata: serde_json::Value::Null,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    fn with_actor(mut self, account: &Account) -> Self {
        self.target_id = Some(account.id);
        self.actor_id = Some(account.id);
        self.actor_role = Some(account.role.as_str().to_string());
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Successful login.
    pub fn login_success(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "login_success",
            AuditCategory::Authentication,
            AuditSeverity::Low,
            format!("Successful login for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }

    /// Failed login attempt. The account is `None` when the identifier did
    /// not resolve; the attempted identifier is preserved in the metadata.
    pub fn login_failed(
        account: Option<&Account>,
        identifier: &str,
        reason: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Self {
        let event = Self::new(
            "login_failed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            format!("Failed login attempt for {}: {}", identifier, reason),
            origin,
            client,
        )
        .with_metadata(serde_json::json!({ "identifier": identifier, "reason": reason }));

        match account {
            Some(account) => event.with_actor(account),
            None => event,
        }
    }

    pub fn logout(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "logout",
            AuditCategory::Authentication,
            AuditSeverity::Low,
            format!("Logout for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }

    pub fn token_refreshed(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "token_refreshed",
            AuditCategory::Authentication,
            AuditSeverity::Low,
            format!("Session token refreshed for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }

    /// Reset requested; recorded whether or not the identifier resolved.
    pub fn password_reset_requested(
        account: Option<&Account>,
        identifier: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Self {
        let event = Self::new(
            "password_reset_requested",
            AuditCategory::Authentication,
            AuditSeverity::Low,
            format!("Password reset requested for {}", identifier),
            origin,
            client,
        )
        .with_metadata(serde_json::json!({ "identifier": identifier }));

        match account {
            Some(account) => event.with_actor(account),
            None => event,
        }
    }

    pub fn password_reset_failed(
        account: Option<&Account>,
        reason: &str,
        origin: &str,
        client: Option<&str>,
    ) -> Self {
        let event = Self::new(
            "password_reset_failed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            format!("Password reset rejected: {}", reason),
            origin,
            client,
        );

        match account {
            Some(account) => event.with_actor(account),
            None => event,
        }
    }

    pub fn password_reset_completed(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "password_reset_completed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            format!("Password reset completed for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }

    pub fn password_changed(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "password_changed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            format!("Password changed for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }

    pub fn password_change_failed(account: &Account, origin: &str, client: Option<&str>) -> Self {
        Self::new(
            "password_change_failed",
            AuditCategory::Security,
            AuditSeverity::Medium,
            format!("Password change rejected for {}", account.email),
            origin,
            client,
        )
        .with_actor(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    #[test]
    fn failed_login_without_account_keeps_identifier() {
        let event = AuditEvent::login_failed(
            None,
            "ghost@example.com",
            "unknown identifier",
            "203.0.113.9",
            Some("curl/8.0"),
        );
        assert_eq!(event.actor_id, None);
        assert_eq!(event.category, AuditCategory::Security);
        assert_eq!(event.severity, AuditSeverity::Medium);
        assert_eq!(event.metadata["identifier"], "ghost@example.com");
    }

    #[test]
    fn login_success_carries_actor() {
        let account = Account::new("admin@example.com", "Admin", "hash", Role::Admin, None);
        let event = AuditEvent::login_success(&account, "203.0.113.9", None);
        assert_eq!(event.actor_id, Some(account.id));
        assert_eq!(event.actor_role.as_deref(), Some("admin"));
        assert_eq!(event.category, AuditCategory::Authentication);
    }
}
