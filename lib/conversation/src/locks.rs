//! Per-thread turn serialization.

use crate::thread::ThreadId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<ThreadId, Arc<AsyncMutex<()>>>;

/// One async mutex per thread id, created on demand and dropped when idle.
#[derive(Debug, Default, Clone)]
pub struct ThreadLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl ThreadLocks {
    /// Creates an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other turn holds the thread, then holds it until the
    /// returned guard is dropped.
    pub async fn acquire(&self, thread_id: &ThreadId) -> ThreadGuard {
        let lock = Arc::clone(self.lock_map().entry(thread_id.clone()).or_default());
        let guard = lock.lock_owned().await;
        ThreadGuard {
            locks: self.clone(),
            thread_id: thread_id.clone(),
            guard: Some(guard),
        }
    }

    /// Returns the number of threads with a holder or waiter.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_map().len()
    }

    /// Returns true if no thread is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_map().is_empty()
    }

    fn lock_map(&self) -> std::sync::MutexGuard<'_, LockMap> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(&self, thread_id: &ThreadId) {
        let mut map = self.lock_map();
        // Only the map's own reference left: nobody holds or awaits it.
        if map
            .get(thread_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(thread_id);
        }
    }
}

/// Exclusive hold on one thread.
#[derive(Debug)]
pub struct ThreadGuard {
    locks: ThreadLocks,
    thread_id: ThreadId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.prune(&self.thread_id);
    }
}
