//! PostgreSQL adapter for the user store and audit sink.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Account, AccountStatus, ActivityStats, AdminTier, AuditEvent, LockoutState, Role};

use super::{AuditSink, UserStore};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct AccountRow {
    account_id: Uuid,
    email: String,
    display_name: String,
    password_hash: String,
    role: String,
    admin_tier: Option<String>,
    permissions: serde_json::Value,
    is_active: bool,
    status: String,
    failed_attempts: i32,
    locked_until: Option<DateTime<Utc>>,
    reset_token_hash: Option<String>,
    reset_token_expires: Option<DateTime<Utc>>,
    login_count: i64,
    last_login: Option<DateTime<Utc>>,
    last_activity: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl TryFrom<AccountRow> for Account {
    type Error = AuthError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let role = Role::parse(&row.role)
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("unknown role: {}", row.role)))?;
        let status = AccountStatus::parse(&row.status)
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("unknown status: {}", row.status)))?;
        let admin_tier = match row.admin_tier.as_deref() {
            Some(tier) => Some(AdminTier::parse(tier).ok_or_else(|| {
                AuthError::Store(anyhow::anyhow!("unknown admin tier: {}", tier))
            })?),
            None => None,
        };
        let permissions = serde_json::from_value(row.permissions)
            .map_err(|e| AuthError::Store(anyhow::anyhow!("bad permissions document: {}", e)))?;

        Ok(Account {
            id: row.account_id,
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role,
            admin_tier,
            permissions,
            is_active: row.is_active,
            status,
            failed_attempts: row.failed_attempts,
            locked_until: row.locked_until,
            reset_token_hash: row.reset_token_hash,
            reset_token_expires: row.reset_token_expires,
            stats: ActivityStats {
                login_count: row.login_count,
                last_login: row.last_login,
                last_activity: row.last_activity,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        })
    }
}

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        account_id UUID PRIMARY KEY,
        email TEXT NOT NULL,
        display_name TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        role TEXT NOT NULL,
        admin_tier TEXT,
        permissions JSONB NOT NULL DEFAULT '{}'::jsonb,
        is_active BOOLEAN NOT NULL DEFAULT TRUE,
        status TEXT NOT NULL,
        failed_attempts INTEGER NOT NULL DEFAULT 0,
        locked_until TIMESTAMPTZ,
        reset_token_hash TEXT,
        reset_token_expires TIMESTAMPTZ,
        login_count BIGINT NOT NULL DEFAULT 0,
        last_login TIMESTAMPTZ,
        last_activity TIMESTAMPTZ,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL,
        deleted_at TIMESTAMPTZ
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS accounts_email_key ON accounts (LOWER(email))",
    r#"
    CREATE TABLE IF NOT EXISTS audit_events (
        event_id UUID PRIMARY KEY,
        action TEXT NOT NULL,
        target_type TEXT NOT NULL,
        target_id UUID,
        actor_id UUID,
        actor_role TEXT,
        description TEXT NOT NULL,
        origin TEXT NOT NULL,
        client TEXT,
        category TEXT NOT NULL,
        severity TEXT NOT NULL,
        metadata JSONB NOT NULL DEFAULT 'null'::jsonb,
        created_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS audit_events_expires_at_idx ON audit_events (expires_at)",
];

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str) -> Result<Self, AuthError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(|e| AuthError::Store(anyhow::anyhow!("Failed to connect: {}", e)))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet. Identifier
    /// uniqueness lives here, in the store, not in application logic.
    pub async fn init_schema(&self) -> Result<(), AuthError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    fn updated(result: sqlx::postgres::PgQueryResult, id: Uuid) -> Result<(), AuthError> {
        if result.rows_affected() == 0 {
            return Err(AuthError::Store(anyhow::anyhow!(
                "account {} not found",
                id
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn health_check(&self) -> Result<(), AuthError> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Database health check failed");
            AuthError::from(e)
        })?;
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE LOWER(email) = LOWER($1) AND deleted_at IS NULL",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError> {
        let row = sqlx::query_as::<_, AccountRow>(
            "SELECT * FROM accounts WHERE account_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Account::try_from).transpose()
    }

    async fn insert(&self, account: &Account) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                account_id, email, display_name, password_hash, role, admin_tier,
                permissions, is_active, status, failed_attempts, locked_until,
                reset_token_hash, reset_token_expires, login_count, last_login,
                last_activity, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            "#,
        )
        .bind(account.id)
        .bind(&account.email)
        .bind(&account.display_name)
        .bind(&account.password_hash)
        .bind(account.role.as_str())
        .bind(account.admin_tier.map(|t| t.as_str()))
        .bind(serde_json::to_value(&account.permissions).unwrap_or_default())
        .bind(account.is_active)
        .bind(account.status.as_str())
        .bind(account.failed_attempts)
        .bind(account.locked_until)
        .bind(&account.reset_token_hash)
        .bind(account.reset_token_expires)
        .bind(account.stats.login_count)
        .bind(account.stats.last_login)
        .bind(account.stats.last_activity)
        .bind(account.created_at)
        .bind(account.updated_at)
        .bind(account.deleted_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AuthError::Validation("Login identifier is already in use".to_string())
            }
            _ => AuthError::from(e),
        })?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: i32,
        lock_duration: Duration,
    ) -> Result<LockoutState, AuthError> {
        // Single statement so concurrent failures on the same account
        // cannot under-count. Both CASEs evaluate against the pre-update
        // row: an expired lock re-bases the counter, otherwise the counter
        // increments and may arm the lock.
        let lock_until = now + lock_duration;
        let row: (i32, Option<DateTime<Utc>>) = sqlx::query_as(
            r#"
            UPDATE accounts SET
                failed_attempts = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= $2 THEN 1
                    ELSE failed_attempts + 1
                END,
                locked_until = CASE
                    WHEN locked_until IS NOT NULL AND locked_until <= $2 THEN NULL
                    WHEN locked_until IS NULL AND failed_attempts + 1 >= $3 THEN $4
                    ELSE locked_until
                END,
                updated_at = $2
            WHERE account_id = $1
            RETURNING failed_attempts, locked_until
            "#,
        )
        .bind(id)
        .bind(now)
        .bind(max_failed_attempts)
        .bind(lock_until)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AuthError::Store(anyhow::anyhow!("account {} not found", id)))?;

        Ok(match row {
            (_, Some(until)) => LockoutState::Locked { until },
            (failed_attempts, None) => LockoutState::Unlocked { failed_attempts },
        })
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE accounts SET failed_attempts = 0, locked_until = NULL WHERE account_id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Self::updated(result, id)
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                login_count = login_count + 1,
                last_login = $2,
                last_activity = $2,
                updated_at = $2
            WHERE account_id = $1
            "#,
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await?;
        Self::updated(result, id)
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError> {
        let result = sqlx::query("UPDATE accounts SET last_activity = $2 WHERE account_id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Self::updated(result, id)
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            "UPDATE accounts SET password_hash = $2, updated_at = $3 WHERE account_id = $1",
        )
        .bind(id)
        .bind(hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Self::updated(result, id)
    }

    async fn set_reset_request(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                reset_token_hash = $2,
                reset_token_expires = $3,
                updated_at = $4
            WHERE account_id = $1
            "#,
        )
        .bind(id)
        .bind(token_hash)
        .bind(expires)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Self::updated(result, id)
    }

    async fn complete_password_reset(&self, id: Uuid, hash: &str) -> Result<(), AuthError> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET
                password_hash = $2,
                reset_token_hash = NULL,
                reset_token_expires = NULL,
                failed_attempts = 0,
                locked_until = NULL,
                updated_at = $3
            WHERE account_id = $1
            "#,
        )
        .bind(id)
        .bind(hash)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Self::updated(result, id)
    }
}

#[async_trait]
impl AuditSink for PgStore {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                event_id, action, target_type, target_id, actor_id, actor_role,
                description, origin, client, category, severity, metadata,
                created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(event.id)
        .bind(&event.action)
        .bind(&event.target_type)
        .bind(event.target_id)
        .bind(event.actor_id)
        .bind(&event.actor_role)
        .bind(&event.description)
        .bind(&event.origin)
        .bind(&event.client)
        .bind(event.category.as_str())
        .bind(event.severity.as_str())
        .bind(&event.metadata)
        .bind(event.created_at)
        .bind(event.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
