//! In-memory store implementations for tests and single-process setups.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::error::AuthError;
use crate::models::{Account, AuditEvent, LockoutState};

use super::{AuditSink, UserStore};

#[derive(Default)]
pub struct MemoryStore {
    accounts: Mutex<HashMap<Uuid, Account>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn accounts(&self) -> MutexGuard<'_, HashMap<Uuid, Account>> {
        self.accounts.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace an account wholesale, bypassing the uniqueness check. This
    /// is how out-of-scope provisioning flows (and tests) mutate fields the
    /// store traits do not cover, e.g. permissions.
    pub fn upsert(&self, account: Account) {
        self.accounts().insert(account.id, account);
    }

    fn update<T>(
        &self,
        id: Uuid,
        f: impl FnOnce(&mut Account) -> T,
    ) -> Result<T, AuthError> {
        let mut accounts = self.accounts();
        let account = accounts
            .get_mut(&id)
            .ok_or_else(|| AuthError::Store(anyhow::anyhow!("account {} not found", id)))?;
        Ok(f(account))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn health_check(&self) -> Result<(), AuthError> {
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AuthError> {
        Ok(self
            .accounts()
            .values()
            .find(|a| a.email.eq_ignore_ascii_case(email) && a.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AuthError> {
        Ok(self
            .accounts()
            .get(&id)
            .filter(|a| a.deleted_at.is_none())
            .cloned())
    }

    async fn insert(&self, account: &Account) -> Result<(), AuthError> {
        let mut accounts = self.accounts();
        if accounts
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&account.email))
        {
            return Err(AuthError::Validation(
                "Login identifier is already in use".to_string(),
            ));
        }
        accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        now: DateTime<Utc>,
        max_failed_attempts: i32,
        lock_duration: Duration,
    ) -> Result<LockoutState, AuthError> {
        self.update(id, |account| {
            let state = if account.locked_until.is_some_and(|until| until <= now) {
                // The lock ran out; this failure starts a fresh count.
                account.failed_attempts = 1;
                account.locked_until = None;
                LockoutState::Unlocked { failed_attempts: 1 }
            } else {
                account.failed_attempts += 1;
                if account.locked_until.is_none() && account.failed_attempts >= max_failed_attempts
                {
                    let until = now + lock_duration;
                    account.locked_until = Some(until);
                    LockoutState::Locked { until }
                } else if let Some(until) = account.locked_until {
                    LockoutState::Locked { until }
                } else {
                    LockoutState::Unlocked {
                        failed_attempts: account.failed_attempts,
                    }
                }
            };
            account.updated_at = now;
            state
        })
    }

    async fn clear_lockout(&self, id: Uuid) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.failed_attempts = 0;
            account.locked_until = None;
        })
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.stats.login_count += 1;
            account.stats.last_login = Some(at);
            account.stats.last_activity = Some(at);
            account.updated_at = at;
        })
    }

    async fn touch_activity(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.stats.last_activity = Some(at);
        })
    }

    async fn set_password_hash(&self, id: Uuid, hash: &str) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.password_hash = hash.to_string();
            account.updated_at = Utc::now();
        })
    }

    async fn set_reset_request(
        &self,
        id: Uuid,
        token_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.reset_token_hash = Some(token_hash.to_string());
            account.reset_token_expires = Some(expires);
            account.updated_at = Utc::now();
        })
    }

    async fn complete_password_reset(&self, id: Uuid, hash: &str) -> Result<(), AuthError> {
        self.update(id, |account| {
            account.password_hash = hash.to_string();
            account.reset_token_hash = None;
            account.reset_token_expires = None;
            account.failed_attempts = 0;
            account.locked_until = None;
            account.updated_at = Utc::now();
        })
    }
}

/// Audit sink that keeps events in memory, with accessors for tests.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count_action(&self, action: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.action == action)
            .count()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn append(&self, event: &AuditEvent) -> Result<(), AuthError> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    async fn seed(store: &MemoryStore) -> Account {
        let account = Account::new("admin@example.com", "Admin", "hash", Role::Admin, None);
        store.insert(&account).await.unwrap();
        account
    }

    #[tokio::test]
    async fn failure_counter_locks_at_threshold() {
        let store = MemoryStore::new();
        let account = seed(&store).await;
        let now = Utc::now();

        for attempt in 1..=4 {
            let state = store
                .record_failure(account.id, now, 5, Duration::minutes(30))
                .await
                .unwrap();
            assert_eq!(
                state,
                LockoutState::Unlocked {
                    failed_attempts: attempt
                }
            );
        }

        let state = store
            .record_failure(account.id, now, 5, Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(
            state,
            LockoutState::Locked {
                until: now + Duration::minutes(30)
            }
        );
    }

    #[tokio::test]
    async fn expired_lock_rebases_counter_to_one() {
        let store = MemoryStore::new();
        let account = seed(&store).await;
        let now = Utc::now();

        for _ in 0..5 {
            store
                .record_failure(account.id, now - Duration::minutes(45), 5, Duration::minutes(30))
                .await
                .unwrap();
        }

        // 45 minutes later the lock has run out; the next failure starts over.
        let state = store
            .record_failure(account.id, now, 5, Duration::minutes(30))
            .await
            .unwrap();
        assert_eq!(state, LockoutState::Unlocked { failed_attempts: 1 });
    }

    #[tokio::test]
    async fn clear_lockout_resets_state() {
        let store = MemoryStore::new();
        let account = seed(&store).await;
        let now = Utc::now();

        for _ in 0..5 {
            store
                .record_failure(account.id, now, 5, Duration::minutes(30))
                .await
                .unwrap();
        }
        store.clear_lockout(account.id).await.unwrap();

        let stored = store.find_by_id(account.id).await.unwrap().unwrap();
        assert_eq!(stored.failed_attempts, 0);
        assert_eq!(stored.locked_until, None);
    }

    #[tokio::test]
    async fn duplicate_identifier_is_rejected() {
        let store = MemoryStore::new();
        seed(&store).await;
        let dup = Account::new("ADMIN@example.com", "Other", "hash", Role::Admin, None);
        assert!(matches!(
            store.insert(&dup).await,
            Err(AuthError::Validation(_))
        ));
    }
}
