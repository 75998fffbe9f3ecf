//! Per-session mutual exclusion.
//!
//! Every chunk write and finalize for a session runs under that session's async mutex.
//! Mutexes live in a sharded registry keyed by session id and are dropped once no task
//! holds or waits for them, so the registry only grows with in-flight sessions.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Shard = Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>;

/// Sharded registry of per-session locks
#[derive(Clone)]
pub struct SessionLocks {
    shards: Arc<Vec<Shard>>,
}

impl Default for SessionLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionLocks {
    /// Create a registry with the default shard count (16 shards)
    pub fn new() -> Self {
        Self::with_shards(16)
    }

    pub fn with_shards(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| Mutex::new(HashMap::new()))
            .collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    fn shard(&self, id: &Uuid) -> &Shard {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        id.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % self.shards.len()]
    }

    /// Wait for exclusive access to `id`. Access is released when the guard drops.
    ///
    /// The registry entry is pruned whenever the last task holding or awaiting it goes away,
    /// including a waiter whose future is dropped before it gets the lock.
    pub async fn acquire(&self, id: Uuid) -> SessionGuard {
        let mutex = {
            let mut shard = self.shard(&id).lock().unwrap_or_else(|e| e.into_inner());
            shard
                .entry(id)
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        let registration = Registration {
            locks: self.clone(),
            id,
        };

        let guard = mutex.lock_owned().await;

        SessionGuard {
            _guard: guard,
            registration,
        }
    }

    /// Number of sessions currently held or awaited.
    pub fn active_count(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    /// Drop the entry for `id` once the registry holds the only reference to it.
    fn prune(&self, id: &Uuid) {
        let mut shard = self.shard(id).lock().unwrap_or_else(|e| e.into_inner());
        let unused = shard
            .get(id)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1);
        if unused {
            shard.remove(id);
        }
    }
}

/// One task's claim on a registry entry. Dropped after that task's mutex handle.
struct Registration {
    locks: SessionLocks,
    id: Uuid,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.locks.prune(&self.id);
    }
}

/// Exclusive access to one session
pub struct SessionGuard {
    // Field order matters: the lock is released before the registration prunes.
    _guard: OwnedMutexGuard<()>,
    registration: Registration,
}

impl SessionGuard {
    pub fn session_id(&self) -> Uuid {
        self.registration.id
    }
}
