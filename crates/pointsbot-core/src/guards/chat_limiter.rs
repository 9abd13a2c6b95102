use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Held for the duration of one interaction step; dropping it unlocks.
#[derive(Debug)]
pub struct ChatLockGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Per-chat mutual exclusion.
///
/// Locks are created on first use and evicted after `idle` without access.
/// A step must finish well within `idle`, otherwise a new caller may get a
/// fresh lock for the same chat.
#[derive(Clone)]
pub struct ChatLimiter {
    locks: Cache<i64, Arc<Mutex<()>>>,
}

impl ChatLimiter {
    /// Create a limiter whose locks expire after `idle` without use.
    #[must_use]
    pub fn new(idle: Duration) -> Self {
        Self {
            locks: Cache::builder().time_to_idle(idle).build(),
        }
    }

    async fn lock_for(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .get_with(chat_id, async { Arc::new(Mutex::new(())) })
            .await
    }

    /// Wait for exclusive access to `chat_id`.
    pub async fn lock(&self, chat_id: i64) -> ChatLockGuard {
        let lock = self.lock_for(chat_id).await;
        ChatLockGuard {
            _guard: lock.lock_owned().await,
        }
    }

    /// Take the lock only if nobody holds it.
    pub async fn try_lock(&self, chat_id: i64) -> Option<ChatLockGuard> {
        let lock = self.lock_for(chat_id).await;
        lock.try_lock_owned()
            .ok()
            .map(|guard| ChatLockGuard { _guard: guard })
    }
}

impl std::fmt::Debug for ChatLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatLimiter")
            .field("entries", &self.locks.entry_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_same_chat_is_exclusive() {
        let limiter = ChatLimiter::new(Duration::from_secs(60));

        let guard = limiter.lock(1).await;
        assert!(limiter.try_lock(1).await.is_none());
        assert!(limiter.try_lock(2).await.is_some());

        drop(guard);
        assert!(limiter.try_lock(1).await.is_some());
    }

    #[tokio::test]
    async fn test_steps_do_not_interleave() {
        let limiter = ChatLimiter::new(Duration::from_secs(60));
        let inside = Arc::new(AtomicUsize::new(0));
        let max_inside = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let limiter = limiter.clone();
            let inside = Arc::clone(&inside);
            let max_inside = Arc::clone(&max_inside);
            handles.push(tokio::spawn(async move {
                let _guard = limiter.lock(42).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.expect("task panicked");
        }

        assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    }
}
