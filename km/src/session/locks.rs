//! Per-conversation turn locks

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

type LockKey = (String, String);

/// Registry of one async mutex per (user, conversation)
///
/// Holding the guard serializes turns of one conversation; different
/// conversations never contend.
#[derive(Default, Clone)]
pub struct TurnLocks {
    locks: Arc<Mutex<HashMap<LockKey, Arc<Mutex<()>>>>>,
}

impl TurnLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive use of a conversation
    pub async fn acquire(&self, user_id: &str, conversation_id: &str) -> OwnedMutexGuard<()> {
        debug!(%user_id, %conversation_id, "TurnLocks::acquire: called");
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry((user_id.to_string(), conversation_id.to_string()))
                .or_default()
                .clone()
        };
        lock.lock_owned().await
    }

    /// Drop entries nobody holds or waits on
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before - locks.len();
        debug!(removed, "TurnLocks::prune: done");
        removed
    }

    /// Number of conversations with a lock entry
    pub async fn tracked(&self) -> usize {
        self.locks.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_conversation_is_serialized() {
        let locks = TurnLocks::new();
        let guard = locks.acquire("u", "c").await;

        let other = locks.clone();
        let waiter = tokio::spawn(async move {
            let _g = other.acquire("u", "c").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_different_conversations_do_not_contend() {
        let locks = TurnLocks::new();
        let _a = locks.acquire("u", "c1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("u", "c2")).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_prune_keeps_held_locks() {
        let locks = TurnLocks::new();
        let held = locks.acquire("u", "c1").await;
        drop(locks.acquire("u", "c2").await);

        assert_eq!(locks.tracked().await, 2);
        assert_eq!(locks.prune().await, 1);
        assert_eq!(locks.tracked().await, 1);
        drop(held);
    }
}
