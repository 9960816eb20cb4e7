use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LockoutConfig;
use crate::error::AuthError;
use crate::models::{Account, LockoutState};
use crate::store::UserStore;

/// Per-account failed-attempt tracking.
///
/// The counter mutation itself is delegated to the store as one atomic
/// update; this type carries the policy (threshold and lock duration) and
/// the read side of the state machine.
#[derive(Clone)]
pub struct LockoutTracker {
    store: Arc<dyn UserStore>,
    max_failed_attempts: i32,
    lock_duration: Duration,
}

impl LockoutTracker {
    pub fn new(store: Arc<dyn UserStore>, config: &LockoutConfig) -> Self {
        Self {
            store,
            max_failed_attempts: config.max_failed_attempts,
            lock_duration: Duration::seconds(config.lock_duration_seconds),
        }
    }

    /// Whether the account is currently locked out. A lock whose expiry has
    /// passed no longer counts; no explicit unlock call exists.
    pub fn is_locked(&self, account: &Account) -> bool {
        account
            .locked_until
            .is_some_and(|until| until > Utc::now())
    }

    pub async fn record_failure(&self, account_id: Uuid) -> Result<LockoutState, AuthError> {
        let state = self
            .store
            .record_failure(
                account_id,
                Utc::now(),
                self.max_failed_attempts,
                self.lock_duration,
            )
            .await?;

        if let LockoutState::Locked { until } = state {
            tracing::warn!(
                account_id = %account_id,
                locked_until = %until,
                "Account locked after repeated failed logins"
            );
        }

        Ok(state)
    }

    pub async fn record_success(&self, account_id: Uuid) -> Result<(), AuthError> {
        self.store.clear_lockout(account_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::store::MemoryStore;

    fn tracker(store: Arc<MemoryStore>) -> LockoutTracker {
        LockoutTracker::new(
            store,
            &LockoutConfig {
                max_failed_attempts: 5,
                lock_duration_seconds: 1800,
            },
        )
    }

    #[tokio::test]
    async fn fifth_failure_locks_success_unlocks() {
        let store = Arc::new(MemoryStore::new());
        let account = Account::new("op@example.com", "Op", "hash", Role::Admin, None);
        store.insert(&account).await.unwrap();
        let tracker = tracker(store.clone());

        for _ in 0..4 {
            let state = tracker.record_failure(account.id).await.unwrap();
            assert!(matches!(state, LockoutState::Unlocked { .. }));
        }
        let state = tracker.record_failure(account.id).await.unwrap();
        assert!(matches!(state, LockoutState::Locked { .. }));

        let locked = store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(tracker.is_locked(&locked));

        tracker.record_success(account.id).await.unwrap();
        let cleared = store.find_by_id(account.id).await.unwrap().unwrap();
        assert!(!tracker.is_locked(&cleared));
        assert_eq!(cleared.failed_attempts, 0);
    }

    #[tokio::test]
    async fn stale_lock_does_not_report_locked() {
        let store = Arc::new(MemoryStore::new());
        let mut account = Account::new("op@example.com", "Op", "hash", Role::Admin, None);
        account.failed_attempts = 5;
        account.locked_until = Some(Utc::now() - Duration::minutes(1));
        store.insert(&account).await.unwrap();

        let tracker = tracker(store);
        assert!(!tracker.is_locked(&account));
    }
}
