//! Per-key generation locks.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serialises work on the same key; different keys never wait on each other.
#[derive(Clone, Default)]
pub struct InFlightLocks {
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl InFlightLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other holder has `key`, then hold it until the guard drops.
    pub async fn acquire(&self, key: &str) -> InFlightGuard {
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        let guard = lock.lock_owned().await;
        InFlightGuard {
            key: key.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// Keys currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

pub struct InFlightGuard {
    key: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own reference left: nobody holds or waits on this key.
        self.locks.remove_if(&self.key, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_waits() {
        let locks = InFlightLocks::new();
        let first = locks.acquire("movie:949").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _g = locks.acquire("movie:949").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_different_keys_do_not_wait() {
        let locks = InFlightLocks::new();
        let _a = locks.acquire("movie:1").await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("movie:2")).await;
        assert!(b.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
