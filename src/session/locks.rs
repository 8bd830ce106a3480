//! Per-session mutual exclusion for stage/commit operations.
//!
//! Each stage or commit call runs to completion inside the session's lock, so
//! two concurrent uploads cannot race on the delete-then-write of the temp
//! file, and a crop cannot run against a half-written restage. Sessions never
//! contend with each other; the slot keys are session-scoped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Registry of per-session async locks.
///
/// Locks are created on first use and kept for the lifetime of the registry.
/// A stale entry for an abandoned session costs one idle mutex; the sessions
/// served by one process are bounded in practice, so no eviction is done.
#[derive(Debug, Default)]
pub struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for a session, waiting if another operation on the
    /// same session is in flight.
    pub async fn acquire(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap();
            Arc::clone(
                locks
                    .entry(session_id.to_string())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };
        lock.lock_owned().await
    }

    /// Number of sessions that have ever taken a lock. Test helper.
    #[cfg(test)]
    fn session_count(&self) -> usize {
        self.locks.lock().unwrap().len()
    }
}

// =============================================================================
// Tests
// =============================================================================
