//! Store traits for the external collaborators this core consumes.
//!
//! The persistent user store and the append-only audit sink live behind
//! traits so deployments can pick the PostgreSQL adapter while tests and
//! single-process setups use the in-memory implementation.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Account, AuditEvent, LockoutState};

pub use memory::{MemoryAuditSink, MemoryStore};
pub use postgres::PgStore;

/// Persistent account store.
///
/// The store owns identifier uniqueness (a unique index on the folded
/// identifier) and the atomicity of the lockout counter update: two
/// concurrent failed attempts on the same account must not under-count.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn health_check(&self) -> Result<(), AuthError>;

    /// Lookup by login identifier, case-insensitively. Soft-deleted
    /// accounts do not resolve.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError>;

    async fn insert(&self, account: &Account) -> Result<(), AuthError>;

    /// Record one failed authentication attempt as a single atomic update.
    ///
    /// An expired lock re-bases the counter to 1 and clears the lock;
    /// otherwise the counter increments and, on reaching
    /// `max_failed_attempts`, the lock is set to `now + lock_duration`.
    async fn record_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: i32,
        lock_duration: Duration,
    ) -> Result<LockoutState, AuthError>;

    /// Reset the failure counter to zero and clear any lock.
    async fn clear_lockout(&self, id: Uuid) -> Result<(), AuthError>;

    /// Bump login statistics after a successful authentication.
    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError>;

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError>;

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AuthError>;

    /// Store the pending reset-token reference and its expiry, replacing
    /// any earlier outstanding reset.
    async fn set_reset_request(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Consume a reset: store the new hash, clear the reset reference and
    /// the lockout state in one update.
    async fn complete_password_reset(&self, id: Uuid, hash: &str) -> Result<(), AuthError>;
}

/// Append-only audit sink. Writes are best-effort from the caller's point
/// of view; the recorder swallows failures after logging them.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthError>;
}
