//! # TTL Locks and Idempotency Markers
//!
//! Two small stores the repost coordinator builds on:
//!
//! - [`LockStore`] — a per-key mutual-exclusion lock with a bounded TTL.
//!   A crashed holder is recovered by expiry: once the TTL passes, the
//!   key is acquirable again. Acquisition is explicit — a second caller
//!   observes [`Acquire::AlreadyHeld`] rather than blocking.
//! - [`MarkerStore`] — TTL-bound processed markers that prevent
//!   re-applying the same correction for the same trigger, independent
//!   of the lock.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

/// Result of a lock acquisition attempt.
#[derive(Debug)]
pub enum Acquire {
    /// The lock is now held; release (or let it expire) via the handle.
    Acquired(LockHandle),
    /// Another holder owns the key and its TTL has not expired.
    AlreadyHeld,
}

impl Acquire {
    /// The handle, if acquisition succeeded.
    pub fn handle(self) -> Option<LockHandle> {
        match self {
            Self::Acquired(handle) => Some(handle),
            Self::AlreadyHeld => None,
        }
    }
}

/// Proof of lock ownership. Release passes the handle back; a handle for
/// an expired (reclaimed) lock releases nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockHandle {
    key: String,
    token: Uuid,
    /// When the lock lapses on its own.
    pub expires_at: DateTime<Utc>,
}

impl LockHandle {
    /// The locked key.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Per-key TTL locks.
pub trait LockStore {
    /// Try to acquire `key` for `ttl`.
    fn acquire(&self, key: &str, ttl: Duration) -> Acquire;

    /// Release a held lock. A stale handle (expired and re-acquired by
    /// someone else) is ignored.
    fn release(&self, handle: LockHandle);
}

/// TTL-bound processed markers.
pub trait MarkerStore {
    /// Set the marker for `key`, valid for `ttl`.
    fn mark(&self, key: &str, ttl: Duration);

    /// Whether an unexpired marker exists for `key`.
    fn is_marked(&self, key: &str) -> bool;
}

/// In-memory lock store.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    held: Mutex<HashMap<String, (Uuid, DateTime<Utc>)>>,
}

impl MemoryLockStore {
    /// Create an empty lock store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LockStore for MemoryLockStore {
    fn acquire(&self, key: &str, ttl: Duration) -> Acquire {
        let now = Utc::now();
        let mut held = self.held.lock();

        if let Some((_, expires_at)) = held.get(key) {
            if *expires_at > now {
                return Acquire::AlreadyHeld;
            }
        }

        let token = Uuid::new_v4();
        let expires_at = now + ttl;
        held.insert(key.to_string(), (token, expires_at));
        Acquire::Acquired(LockHandle {
            key: key.to_string(),
            token,
            expires_at,
        })
    }

    fn release(&self, handle: LockHandle) {
        let mut held = self.held.lock();
        if let Some((token, _)) = held.get(handle.key()) {
            if *token == handle.token {
                held.remove(handle.key());
            }
        }
    }
}

/// In-memory marker store.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    marks: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryMarkerStore {
    /// Create an empty marker store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn mark(&self, key: &str, ttl: Duration) {
        self.marks.lock().insert(key.to_string(), Utc::now() + ttl);
    }

    fn is_marked(&self, key: &str) -> bool {
        match self.marks.lock().get(key) {
            Some(expires_at) => *expires_at > Utc::now(),
            None => false,
        }
    }
}
