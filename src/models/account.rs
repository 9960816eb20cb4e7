//! Account model - operator accounts with authorization and lockout state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;
use uuid::Uuid;

/// Account role. Only `Admin` accounts may authenticate against this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(Role::Admin),
            "customer" => Some(Role::Customer),
            _ => None,
        }
    }

    /// Whether the role may use the authentication core at all.
    pub fn is_privileged(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// Ordered admin tier. Variant order is the privilege order, so the derived
/// `Ord` gives `Moderator < Manager < Super`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum AdminTier {
    Moderator,
    Manager,
    Super,
}

impl AdminTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminTier::Moderator => "moderator",
            AdminTier::Manager => "manager",
            AdminTier::Super => "super",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "moderator" => Some(AdminTier::Moderator),
            "manager" => Some(AdminTier::Manager),
            "super" => Some(AdminTier::Super),
            _ => None,
        }
    }
}

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
    Suspended,
    Banned,
    Pending,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Banned => "banned",
            AccountStatus::Pending => "pending",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AccountStatus::Active),
            "inactive" => Some(AccountStatus::Inactive),
            "suspended" => Some(AccountStatus::Suspended),
            "banned" => Some(AccountStatus::Banned),
            "pending" => Some(AccountStatus::Pending),
            _ => None,
        }
    }

    /// Statuses that may complete a login.
    pub fn allows_login(&self) -> bool {
        matches!(self, AccountStatus::Active | AccountStatus::Pending)
    }
}

/// Fixed-shape activity counters, zero-valued at account creation so
/// downstream code never deals with an absent stats object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityStats {
    pub login_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
}

/// Lockout state as reported by the store after an atomic update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutState {
    Unlocked { failed_attempts: i32 },
    Locked { until: DateTime<Utc> },
}

/// Operator account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: Uuid,
    /// Unique login identifier, matched case-insensitively by the store.
    pub email: String,
    pub display_name: String,
    pub password_hash: String,
    pub role: Role,
    /// Present if and only if the role is privileged.
    pub admin_tier: Option<AdminTier>,
    pub permissions: HashMap<String, bool>,
    pub is_active: bool,
    pub status: AccountStatus,
    pub failed_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub reset_token_hash: Option<String>,
    pub reset_token_expires: Option<DateTime<Utc>>,
    pub stats: ActivityStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft delete only; this core never hard-deletes accounts.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn new(
        email: impl Into<String>,
        display_name: impl Into<String>,
        password_hash: impl Into<String>,
        role: Role,
        admin_tier: Option<AdminTier>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: email.into().trim().to_lowercase(),
            display_name: display_name.into(),
            password_hash: password_hash.into(),
            role,
            admin_tier,
            permissions: HashMap::new(),
            is_active: true,
            status: AccountStatus::Active,
            failed_attempts: 0,
            locked_until: None,
            reset_token_hash: None,
            reset_token_expires: None,
            stats: ActivityStats::default(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Whether the account holds the named permission.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.get(permission).copied().unwrap_or(false)
    }

    /// Projection safe to hand to clients: no secret, no reset state.
    pub fn sanitized(&self) -> SanitizedAccount {
        SanitizedAccount {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            role: self.role,
            admin_tier: self.admin_tier,
            permissions: self.permissions.clone(),
            status: self.status,
            is_active: self.is_active,
            login_count: self.stats.login_count,
            last_login: self.stats.last_login,
            created_at: self.created_at,
        }
    }
}

/// Account projection without sensitive fields.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SanitizedAccount {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub role: Role,
    pub admin_tier: Option<AdminTier>,
    pub permissions: HashMap<String, bool>,
    pub status: AccountStatus,
    pub is_active: bool,
    pub login_count: i64,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
