//! Per-member operation locks
//!
//! Single-writer-per-member discipline: transitions on the same member
//! are serialized, transitions on distinct members run in parallel.
//! The outer map lock is only held long enough to clone the per-member
//! mutex handle; the async mutex is then awaited outside it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::types::MemberId;

/// Keyed map of per-member async mutexes
#[derive(Default)]
pub struct MemberLocks {
    locks: Mutex<HashMap<MemberId, Arc<AsyncMutex<()>>>>,
}

impl MemberLocks {
    /// Create an empty lock map
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (creating if needed) the lock handle for a member
    pub fn lock_for(&self, member: MemberId) -> Arc<AsyncMutex<()>> {
        self.locks
            .lock()
            .entry(member)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Drop lock entries no longer held by anyone
    ///
    /// Safe because `lock_for` recreates entries on demand; an entry
    /// with outstanding handles (strong count > 1) is kept.
    pub fn prune(&self) {
        self.locks
            .lock()
            .retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of tracked member locks
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    /// Whether the map is empty
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}
